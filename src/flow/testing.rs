//! In-memory working copy for flow tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::GitError;
use crate::flow::FlowContext;
use crate::git::{
    CommitOutcome, GitResult, PullOutcome, PushOutcome, StageSelection, WorkingCopy,
    WorkingCopyOpener,
};
use crate::session::{AuthenticatedRemote, SecretToken, Session, UserProfile, sample_repo};

pub struct FakeState {
    pub is_repository: bool,
    pub dirty: bool,
    pub untracked: Vec<PathBuf>,
    pub remote_branches: Vec<String>,
    /// `None` means detached
    pub current_branch: Option<String>,
    pub up_to_date: bool,
    pub pull_outcome: PullOutcome,
    pub push_outcome: PushOutcome,
    /// Staging leaves the index equal to HEAD
    pub stage_changes_nothing: bool,

    pub calls: Vec<&'static str>,
    pub staged: Vec<StageSelection>,
    pub commits: Vec<String>,
    pub origin: Option<String>,
    pub pulls: Vec<String>,
    pub pushes: Vec<(String, String)>,
    has_staged: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            is_repository: true,
            dirty: false,
            untracked: Vec::new(),
            remote_branches: Vec::new(),
            current_branch: Some("main".to_string()),
            up_to_date: true,
            pull_outcome: PullOutcome::ChangesReceived,
            push_outcome: PushOutcome::Pushed,
            stage_changes_nothing: false,
            calls: Vec::new(),
            staged: Vec::new(),
            commits: Vec::new(),
            origin: None,
            pulls: Vec::new(),
            pushes: Vec::new(),
            has_staged: false,
        }
    }
}

/// Shared handle; doubles as the opener
#[derive(Clone, Default)]
pub struct Fake {
    state: Arc<Mutex<FakeState>>,
}

impl Fake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn called(&self, name: &str) -> bool {
        self.state().calls.iter().any(|c| *c == name)
    }

    fn working_copy(&self, path: &Path) -> Box<dyn WorkingCopy> {
        Box::new(FakeWorkingCopy {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
        })
    }
}

impl WorkingCopyOpener for Fake {
    fn open(&self, path: &Path) -> GitResult<Box<dyn WorkingCopy>> {
        let mut state = self.state();
        state.calls.push("open");
        if !state.is_repository {
            return Err(GitError::NotARepository(path.to_path_buf()));
        }
        drop(state);
        Ok(self.working_copy(path))
    }

    fn init(&self, path: &Path) -> GitResult<Box<dyn WorkingCopy>> {
        let mut state = self.state();
        state.calls.push("init");
        state.is_repository = true;
        drop(state);
        Ok(self.working_copy(path))
    }

    fn clone_repo(&self, _url: &str, path: &Path) -> GitResult<Box<dyn WorkingCopy>> {
        self.state().calls.push("clone");
        Ok(self.working_copy(path))
    }
}

struct FakeWorkingCopy {
    state: Arc<Mutex<FakeState>>,
    path: PathBuf,
}

impl FakeWorkingCopy {
    fn record(&self, call: &'static str) -> MutexGuard<'_, FakeState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
    }
}

impl WorkingCopy for FakeWorkingCopy {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_dirty(&self) -> GitResult<bool> {
        Ok(self.record("is_dirty").dirty)
    }

    fn untracked_files(&self) -> GitResult<Vec<PathBuf>> {
        Ok(self.record("untracked_files").untracked.clone())
    }

    fn status_text(&self) -> GitResult<String> {
        let state = self.record("status_text");
        let mut text = String::from("On branch main\n");
        for path in &state.untracked {
            text.push_str(&format!("?? {}\n", path.display()));
        }
        Ok(text)
    }

    fn stage(&mut self, selection: &StageSelection) -> GitResult<()> {
        let mut state = self.record("stage");
        state.staged.push(selection.clone());
        state.has_staged = !state.stage_changes_nothing;
        Ok(())
    }

    fn commit(&mut self, message: &str) -> GitResult<CommitOutcome> {
        let mut state = self.record("commit");
        if !state.has_staged {
            return Ok(CommitOutcome::NothingToCommit);
        }
        state.has_staged = false;
        state.dirty = false;
        state.untracked.clear();
        state.commits.push(message.to_string());
        Ok(CommitOutcome::Committed("deadbeefcafe".to_string()))
    }

    fn fetch_all(&mut self) -> GitResult<()> {
        self.record("fetch_all");
        Ok(())
    }

    fn remote_branches(&self) -> GitResult<Vec<String>> {
        Ok(self.record("remote_branches").remote_branches.clone())
    }

    fn current_branch(&self) -> GitResult<Option<String>> {
        Ok(self.record("current_branch").current_branch.clone())
    }

    fn is_head_detached(&self) -> GitResult<bool> {
        Ok(self.record("is_head_detached").current_branch.is_none())
    }

    fn upstream_up_to_date(&self) -> GitResult<bool> {
        Ok(self.record("upstream_up_to_date").up_to_date)
    }

    fn hard_reset(&mut self) -> GitResult<()> {
        self.record("hard_reset").dirty = false;
        Ok(())
    }

    fn configure_origin(&mut self, remote: &AuthenticatedRemote) -> GitResult<()> {
        self.record("configure_origin").origin = Some(remote.display_url().to_string());
        Ok(())
    }

    fn pull(&mut self, branch: &str) -> GitResult<PullOutcome> {
        let mut state = self.record("pull");
        state.pulls.push(branch.to_string());
        Ok(state.pull_outcome)
    }

    fn push(&mut self, local: &str, remote_branch: &str) -> GitResult<PushOutcome> {
        let mut state = self.record("push");
        state
            .pushes
            .push((local.to_string(), remote_branch.to_string()));
        Ok(state.push_outcome.clone())
    }
}

/// Context for `octo/demo` backed by `fake`
pub fn context(fake: &Fake, local_path: Option<&str>) -> FlowContext {
    let user = UserProfile {
        login: "octo".into(),
        name: None,
        email: None,
        avatar_url: None,
    };

    FlowContext {
        opener: Arc::new(fake.clone()),
        repository: sample_repo("octo", "demo"),
        session: Session::new(SecretToken::new("ghp_test"), user),
        local_path: local_path.map(PathBuf::from),
        proposed_path: Some(PathBuf::from("/proposed/demo")),
        default_commit_message: "Commit made from hub-commander".to_string(),
    }
}
