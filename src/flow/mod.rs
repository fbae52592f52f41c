//! Action orchestration
//!
//! Commit, pull and push are explicit state machines. The presentation layer
//! calls [`Flow::start`], shows each [`Prompt`] it gets back and feeds the
//! reply to [`Flow::resume`] until a [`FlowOutcome`] comes out. Nothing here
//! knows about terminals, so the same flows back the TUI and the tests.
//!
//! Any error ends the flow. Completed steps are not rolled back.

mod commit;
mod locks;
mod prompt;
mod pull;
mod push;

#[cfg(test)]
mod testing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use commit::CommitFlow;
pub use locks::*;
pub use prompt::*;
pub use pull::PullFlow;
pub use push::PushFlow;

use crate::error::{FlowError, GitError, Result};
use crate::git::{WorkingCopy, WorkingCopyOpener};
use crate::session::{RepositorySummary, Session};

/// A user-driven operation on one repository's working copy
pub trait Flow: Send {
    /// Short label for status messages
    fn name(&self) -> &'static str;

    /// First step; may only be called once
    fn start(&mut self) -> Result<Step>;

    /// Feed the answer to the last prompt
    fn resume(&mut self, answer: Answer) -> Result<Step>;

    /// Working copy validated during this run, if any
    fn local_path(&self) -> Option<&Path>;
}

/// Everything a flow needs, handed over explicitly by the caller
#[derive(Clone)]
pub struct FlowContext {
    pub opener: Arc<dyn WorkingCopyOpener>,
    pub repository: RepositorySummary,
    pub session: Session,
    /// Working copy already known for this repository
    pub local_path: Option<PathBuf>,
    /// Suggested answer when the path has to be asked for
    pub proposed_path: Option<PathBuf>,
    /// Used when a commit message is left blank
    pub default_commit_message: String,
}

impl std::fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowContext")
            .field("repository", &self.repository.id)
            .field("local_path", &self.local_path)
            .finish_non_exhaustive()
    }
}

/// Outcome of resolving and opening the local path
pub(crate) enum Opened {
    Ready(Box<dyn WorkingCopy>),
    /// The path exists but holds no history
    NotARepository(PathBuf),
}

impl FlowContext {
    /// Prompt for the working-copy directory
    pub(crate) fn path_prompt(&self) -> Prompt {
        Prompt::Text {
            title: "Local path".to_string(),
            message: format!("Local working copy for {}:", self.repository.id),
            initial: self
                .proposed_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            masked: false,
        }
    }

    /// Open `path`, re-validating it even when it was known before
    pub(crate) fn open(&self, path: &Path) -> Result<Opened> {
        match self.opener.open(path) {
            Ok(working_copy) => Ok(Opened::Ready(working_copy)),
            Err(GitError::NotARepository(path)) => Ok(Opened::NotARepository(path)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Interpret the answer to [`FlowContext::path_prompt`]; `None` means cancel
pub(crate) fn path_answer(answer: Answer) -> std::result::Result<Option<PathBuf>, FlowError> {
    match answer {
        Answer::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                Ok(None)
            } else {
                Ok(Some(expand_home(text)))
            }
        }
        Answer::Dismissed => Ok(None),
        Answer::Yes | Answer::No => Err(FlowError::UnexpectedAnswer),
    }
}

fn expand_home(path: &str) -> PathBuf {
    let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    match (path.strip_prefix("~"), home) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}

/// Remote branch names, deduplicated and sorted for presentation
pub(crate) fn branch_choices(mut branches: Vec<String>) -> Vec<String> {
    branches.sort();
    branches.dedup();
    branches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_answer() {
        assert_eq!(path_answer(Answer::Text("  ".into())).unwrap(), None);
        assert_eq!(path_answer(Answer::Dismissed).unwrap(), None);
        assert_eq!(
            path_answer(Answer::Text(" /srv/demo ".into())).unwrap(),
            Some(PathBuf::from("/srv/demo"))
        );
        assert!(path_answer(Answer::Yes).is_err());
    }

    #[test]
    fn test_tilde_expansion() {
        if let Some(dirs) = directories::BaseDirs::new() {
            assert_eq!(expand_home("~/src/demo"), dirs.home_dir().join("src/demo"));
        }
        assert_eq!(expand_home("~user/x"), PathBuf::from("~user/x"));
    }

    #[test]
    fn test_branch_choices_dedup_and_sort() {
        let choices = branch_choices(vec![
            "release".into(),
            "dev".into(),
            "release".into(),
            "alpha".into(),
        ]);
        assert_eq!(choices, vec!["alpha", "dev", "release"]);
    }
}
