//! In-memory application state
//!
//! Owned by the presentation layer and handed to the orchestrator explicitly.
//! Nothing here is persisted: the token and everything derived from it die
//! with the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::flow::OperationLocks;
use crate::session::{RepoId, RepositorySummary, Session, filter_repositories};

/// Process-wide application state
#[derive(Debug, Default)]
pub struct AppState {
    /// Authenticated session, once the token has been verified
    session: Option<Session>,

    /// Last fetched repository list
    repositories: Vec<RepositorySummary>,

    /// Set after any write; the list must be re-fetched before it is trusted
    stale: bool,

    /// Sequence number of the newest repository list request
    list_request: u64,

    /// Sequence number source for branch list requests
    branch_request: u64,

    /// Newest unanswered branch list request per repository
    pending_branches: HashMap<RepoId, u64>,

    /// Current search query
    filter: String,

    /// Repository the user is working with
    selected: Option<RepoId>,

    /// Local working copies validated during this process
    local_paths: HashMap<RepoId, PathBuf>,

    /// At most one outstanding operation per repository
    pub locks: OperationLocks,
}

impl AppState {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Replace the cached list wholesale
    pub fn set_repositories(&mut self, mut repositories: Vec<RepositorySummary>) {
        repositories.sort_by_key(|r| r.name.to_lowercase());
        self.repositories = repositories;
        self.stale = false;

        if let Some(ref selected) = self.selected {
            if !self.repositories.iter().any(|r| &r.id == selected) {
                self.selected = None;
            }
        }
    }

    pub fn repositories(&self) -> &[RepositorySummary] {
        &self.repositories
    }

    /// Record that a write happened and the cached list can no longer be trusted
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Register a new repository list request; older responses become obsolete
    pub fn begin_list_request(&mut self) -> u64 {
        self.list_request += 1;
        self.list_request
    }

    /// Apply a fetched list only if it answers the newest request.
    /// Returns false when the response was dropped.
    pub fn apply_list_response(&mut self, request: u64, repositories: Vec<RepositorySummary>) -> bool {
        if request != self.list_request {
            return false;
        }
        self.set_repositories(repositories);
        true
    }

    /// Register a new branch list request for `id`
    pub fn begin_branch_request(&mut self, id: &RepoId) -> u64 {
        self.branch_request += 1;
        self.pending_branches.insert(id.clone(), self.branch_request);
        self.branch_request
    }

    /// Whether `request` is the newest outstanding branch request for `id`.
    /// Answering it clears the pending entry.
    pub fn finish_branch_request(&mut self, id: &RepoId, request: u64) -> bool {
        if self.pending_branches.get(id) != Some(&request) {
            return false;
        }
        self.pending_branches.remove(id);
        true
    }

    /// A branch list for `id` has been requested and not answered yet
    pub fn branches_pending(&self, id: &RepoId) -> bool {
        self.pending_branches.contains_key(id)
    }

    /// Default branch of `id` as last fetched, or `None` while a write has
    /// made the cached value untrustworthy
    pub fn current_default_branch(&self, id: &RepoId) -> Option<&str> {
        if self.stale {
            return None;
        }
        self.repository(id).map(|r| r.default_branch.as_str())
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, query: impl Into<String>) {
        self.filter = query.into();
    }

    /// Repositories matching the current filter
    pub fn visible_repositories(&self) -> Vec<&RepositorySummary> {
        filter_repositories(&self.repositories, &self.filter)
    }

    pub fn repository(&self, id: &RepoId) -> Option<&RepositorySummary> {
        self.repositories.iter().find(|r| &r.id == id)
    }

    pub fn select(&mut self, id: Option<RepoId>) {
        self.selected = id;
    }

    pub fn selected(&self) -> Option<&RepositorySummary> {
        self.selected.as_ref().and_then(|id| self.repository(id))
    }

    /// Remember a validated working copy for `id`
    pub fn remember_local_path(&mut self, id: RepoId, path: PathBuf) {
        self.local_paths.insert(id, path);
    }

    /// Known working copy for `id`, if it still exists on disk
    pub fn known_local_path(&self, id: &RepoId) -> Option<&Path> {
        self.local_paths
            .get(id)
            .map(PathBuf::as_path)
            .filter(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::sample_repo;
    use tempfile::TempDir;

    #[test]
    fn test_new_state() {
        let state = AppState::new();
        assert!(state.session().is_none());
        assert!(state.repositories().is_empty());
        assert!(!state.is_stale());
    }

    #[test]
    fn test_set_repositories_clears_stale_and_sorts() {
        let mut state = AppState::new();
        state.mark_stale();
        state.set_repositories(vec![sample_repo("o", "zeta"), sample_repo("o", "Alpha")]);

        assert!(!state.is_stale());
        let names: Vec<_> = state.repositories().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "zeta"]);
    }

    #[test]
    fn test_older_list_response_is_dropped() {
        let mut state = AppState::new();
        let first = state.begin_list_request();
        state.mark_stale();
        let second = state.begin_list_request();

        let mut fresh = sample_repo("o", "demo");
        fresh.default_branch = "dev".to_string();
        assert!(state.apply_list_response(second, vec![fresh]));
        assert!(!state.apply_list_response(first, vec![sample_repo("o", "demo")]));

        let id = RepoId::new("o", "demo");
        assert_eq!(state.current_default_branch(&id), Some("dev"));
        assert!(!state.is_stale());
    }

    #[test]
    fn test_default_branch_hidden_while_stale() {
        let mut state = AppState::new();
        let id = RepoId::new("o", "demo");
        state.set_repositories(vec![sample_repo("o", "demo")]);
        assert_eq!(state.current_default_branch(&id), Some("main"));

        state.mark_stale();
        assert_eq!(state.current_default_branch(&id), None);
    }

    #[test]
    fn test_branch_requests_tracked_per_repository() {
        let mut state = AppState::new();
        let a = RepoId::new("o", "a");
        let b = RepoId::new("o", "b");

        let old = state.begin_branch_request(&a);
        let other = state.begin_branch_request(&b);
        let new = state.begin_branch_request(&a);

        assert!(!state.finish_branch_request(&a, old));
        assert!(state.branches_pending(&a));
        assert!(state.finish_branch_request(&a, new));
        assert!(!state.branches_pending(&a));
        assert!(!state.finish_branch_request(&a, new));
        assert!(state.finish_branch_request(&b, other));
    }

    #[test]
    fn test_selection_dropped_when_repository_disappears() {
        let mut state = AppState::new();
        state.set_repositories(vec![sample_repo("o", "a"), sample_repo("o", "b")]);
        state.select(Some(RepoId::new("o", "b")));
        assert_eq!(state.selected().map(|r| r.name.as_str()), Some("b"));

        state.set_repositories(vec![sample_repo("o", "a")]);
        assert!(state.selected().is_none());
    }

    #[test]
    fn test_visible_repositories_follow_filter() {
        let mut state = AppState::new();
        state.set_repositories(vec![
            sample_repo("o", "web-app"),
            sample_repo("o", "cli"),
            sample_repo("o", "WebSite"),
        ]);
        state.set_filter("web");
        let names: Vec<_> = state
            .visible_repositories()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["web-app", "WebSite"]);
    }

    #[test]
    fn test_known_local_path_requires_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut state = AppState::new();
        let id = RepoId::new("o", "demo");

        state.remember_local_path(id.clone(), temp_dir.path().to_path_buf());
        assert_eq!(state.known_local_path(&id), Some(temp_dir.path()));

        state.remember_local_path(id.clone(), temp_dir.path().join("missing"));
        assert!(state.known_local_path(&id).is_none());
    }
}
