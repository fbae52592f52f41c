//! Working-copy abstraction
//!
//! The flows only ever see these traits, so they can be driven against
//! in-memory fakes. [`Git2Opener`](super::Git2Opener) is the real engine.

use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::session::AuthenticatedRemote;

/// Result of a working-copy operation
pub type GitResult<T> = std::result::Result<T, GitError>;

/// Which changes to stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSelection {
    /// Tracked and untracked changes, deletions included
    All,
    /// Exactly these paths, relative to the working-copy root
    Paths(Vec<PathBuf>),
}

impl StageSelection {
    /// Parse a comma-separated file list; blank input selects everything
    pub fn parse(input: &str) -> Self {
        let paths: Vec<PathBuf> = input
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect();

        if paths.is_empty() {
            StageSelection::All
        } else {
            StageSelection::Paths(paths)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(String),
    /// The index matched `HEAD`; no commit was written
    NothingToCommit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    ChangesReceived,
    AlreadyUpToDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    /// The remote refused the update (non-fast-forward, protected branch, ...)
    Rejected(String),
}

/// A validated local working copy
///
/// Opened per operation and dropped afterwards; nothing about the directory
/// is assumed to hold between two operations.
pub trait WorkingCopy: Send {
    fn path(&self) -> &Path;

    /// Tracked files differ from `HEAD` (untracked files excluded)
    fn is_dirty(&self) -> GitResult<bool>;

    fn untracked_files(&self) -> GitResult<Vec<PathBuf>>;

    /// Human-readable status summary
    fn status_text(&self) -> GitResult<String>;

    fn stage(&mut self, selection: &StageSelection) -> GitResult<()>;

    fn commit(&mut self, message: &str) -> GitResult<CommitOutcome>;

    /// Update remote-tracking refs of every configured remote
    fn fetch_all(&mut self) -> GitResult<()>;

    /// Remote branch names without the remote prefix, `HEAD` excluded
    fn remote_branches(&self) -> GitResult<Vec<String>>;

    /// Checked-out branch; `None` when `HEAD` is detached
    fn current_branch(&self) -> GitResult<Option<String>>;

    fn is_head_detached(&self) -> GitResult<bool>;

    /// The current branch has an upstream and neither side is ahead
    fn upstream_up_to_date(&self) -> GitResult<bool>;

    /// Discard tracked changes (`reset --hard HEAD`)
    fn hard_reset(&mut self) -> GitResult<()>;

    /// Point `origin` at the credentialed URL, creating it if needed
    fn configure_origin(&mut self, remote: &AuthenticatedRemote) -> GitResult<()>;

    /// Fetch `origin/<branch>` and merge it into the current branch
    fn pull(&mut self, branch: &str) -> GitResult<PullOutcome>;

    /// Push `local` to `remote_branch` on `origin`
    fn push(&mut self, local: &str, remote_branch: &str) -> GitResult<PushOutcome>;
}

/// Opens, creates and clones working copies
pub trait WorkingCopyOpener: Send + Sync {
    /// Fails with [`GitError::NotARepository`] when `path` has no history
    fn open(&self, path: &Path) -> GitResult<Box<dyn WorkingCopy>>;

    fn init(&self, path: &Path) -> GitResult<Box<dyn WorkingCopy>>;

    fn clone_repo(&self, url: &str, path: &Path) -> GitResult<Box<dyn WorkingCopy>>;
}
