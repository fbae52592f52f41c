//! Git backend using libgit2
//!
//! Provides the working-copy operations without shelling out to the git CLI.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Cred, ErrorClass, ErrorCode, FetchOptions, FetchPrune, IndexAddOption, PushOptions,
    RemoteCallbacks, Repository, ResetType, Signature, Status, StatusOptions,
};
use tracing::{debug, info, instrument, warn};

use super::working_copy::{
    CommitOutcome, GitResult, PullOutcome, PushOutcome, StageSelection, WorkingCopy,
    WorkingCopyOpener,
};
use crate::error::GitError;
use crate::session::{AuthenticatedRemote, CommitIdentity, SecretToken};

const ORIGIN: &str = "origin";

/// Opens working copies backed by libgit2
#[derive(Debug, Clone, Default)]
pub struct Git2Opener {
    /// Used for clone credentials and redaction
    token: Option<SecretToken>,
    /// Author of commits made by the application; falls back to git config
    identity: Option<CommitIdentity>,
}

impl Git2Opener {
    pub fn new(token: Option<SecretToken>, identity: Option<CommitIdentity>) -> Self {
        Self { token, identity }
    }

    fn wrap(&self, repo: Repository, path: &Path) -> Box<dyn WorkingCopy> {
        let path = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.to_path_buf());

        Box::new(GitBackend {
            repo,
            path,
            token: self.token.clone(),
            identity: self.identity.clone(),
            remote: None,
        })
    }

    fn redact(&self, text: &str) -> String {
        match self.token {
            Some(ref token) => token.redact(text),
            None => text.to_string(),
        }
    }
}

impl WorkingCopyOpener for Git2Opener {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn open(&self, path: &Path) -> GitResult<Box<dyn WorkingCopy>> {
        // No discovery: a parent directory's history does not count
        let repo = Repository::open(path).map_err(|e| match e.code() {
            ErrorCode::NotFound => GitError::NotARepository(path.to_path_buf()),
            _ => GitError::OperationFailed(self.redact(e.message())),
        })?;

        if repo.is_bare() {
            return Err(GitError::NotARepository(path.to_path_buf()));
        }

        debug!("Opened repository");
        Ok(self.wrap(repo, path))
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn init(&self, path: &Path) -> GitResult<Box<dyn WorkingCopy>> {
        std::fs::create_dir_all(path).map_err(|e| GitError::OperationFailed(e.to_string()))?;
        let repo =
            Repository::init(path).map_err(|e| GitError::OperationFailed(self.redact(e.message())))?;

        info!("Initialized repository");
        Ok(self.wrap(repo, path))
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn clone_repo(&self, url: &str, path: &Path) -> GitResult<Box<dyn WorkingCopy>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GitError::OperationFailed(e.to_string()))?;
        }

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(self.token.as_ref()));

        let repo = RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(url, path)
            .map_err(|e| classify(&e, |m| self.redact(m)))?;

        info!(url = %self.redact(url), "Cloned repository");
        Ok(self.wrap(repo, path))
    }
}

/// A working copy opened through libgit2
pub struct GitBackend {
    repo: Repository,
    path: PathBuf,
    token: Option<SecretToken>,
    identity: Option<CommitIdentity>,
    /// Set once `origin` has been pointed at a credentialed URL
    remote: Option<AuthenticatedRemote>,
}

impl GitBackend {
    fn credential(&self) -> Option<&SecretToken> {
        self.remote
            .as_ref()
            .map(AuthenticatedRemote::token)
            .or(self.token.as_ref())
    }

    fn redact(&self, text: &str) -> String {
        let text = match self.remote {
            Some(ref remote) => remote.redact(text),
            None => text.to_string(),
        };
        match self.token {
            Some(ref token) => token.redact(&text),
            None => text,
        }
    }

    fn fail(&self, err: git2::Error) -> GitError {
        classify(&err, |m| self.redact(m))
    }

    fn signature(&self) -> GitResult<Signature<'static>> {
        match self.identity {
            Some(ref identity) => Signature::now(&identity.name, &identity.email),
            None => self.repo.signature(),
        }
        .map_err(|e| self.fail(e))
    }

    fn statuses(&self, include_untracked: bool) -> GitResult<Vec<(String, Status)>> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(include_untracked)
            .recurse_untracked_dirs(include_untracked)
            .include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut options))
            .map_err(|e| self.fail(e))?;

        Ok(statuses
            .iter()
            .filter_map(|entry| entry.path().map(|p| (p.to_string(), entry.status())))
            .collect())
    }

    /// Full ref name `HEAD` points at, even when the branch is unborn
    fn head_ref_name(&self) -> GitResult<Option<String>> {
        if self.repo.head_detached().map_err(|e| self.fail(e))? {
            return Ok(None);
        }
        let head = self.repo.find_reference("HEAD").map_err(|e| self.fail(e))?;
        Ok(head.symbolic_target().map(str::to_string))
    }

    fn fetch_options(&self) -> FetchOptions<'_> {
        let mut options = FetchOptions::new();
        options
            .remote_callbacks(remote_callbacks(self.credential()))
            .prune(FetchPrune::On);
        options
    }

    fn fast_forward(&self, head_ref: &str, target: git2::Oid, unborn: bool) -> GitResult<()> {
        // Check out before moving the ref so the old HEAD is the baseline
        let object = self
            .repo
            .find_object(target, None)
            .map_err(|e| self.fail(e))?;
        let mut checkout = CheckoutBuilder::new();
        if unborn {
            checkout.force();
        } else {
            checkout.safe();
        }
        self.repo
            .checkout_tree(&object, Some(&mut checkout))
            .map_err(|e| self.fail(e))?;

        let message = format!("pull: fast-forward to {}", target);
        if unborn {
            self.repo
                .reference(head_ref, target, true, &message)
                .map_err(|e| self.fail(e))?;
        } else {
            let mut reference = self.repo.find_reference(head_ref).map_err(|e| self.fail(e))?;
            reference
                .set_target(target, &message)
                .map_err(|e| self.fail(e))?;
        }

        self.repo.set_head(head_ref).map_err(|e| self.fail(e))
    }

    fn merge_commit(&self, branch: &str, fetched: &git2::AnnotatedCommit<'_>) -> GitResult<()> {
        self.repo
            .merge(&[fetched], None, None)
            .map_err(|e| self.fail(e))?;

        let mut index = self.repo.index().map_err(|e| self.fail(e))?;
        if index.has_conflicts() {
            let count = index.conflicts().map_err(|e| self.fail(e))?.count();
            warn!(count, "Merge left conflicts in the working copy");
            return Err(GitError::Conflict(count));
        }

        let tree_id = index.write_tree().map_err(|e| self.fail(e))?;
        let tree = self.repo.find_tree(tree_id).map_err(|e| self.fail(e))?;
        let local = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| self.fail(e))?;
        let remote = self
            .repo
            .find_commit(fetched.id())
            .map_err(|e| self.fail(e))?;
        let signature = self.signature()?;

        self.repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                &format!("Merge branch '{}' of {}", branch, ORIGIN),
                &tree,
                &[&local, &remote],
            )
            .map_err(|e| self.fail(e))?;
        self.repo.cleanup_state().map_err(|e| self.fail(e))
    }
}

impl WorkingCopy for GitBackend {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_dirty(&self) -> GitResult<bool> {
        Ok(self
            .statuses(false)?
            .iter()
            .any(|(_, status)| !status.is_ignored() && !status.is_wt_new()))
    }

    fn untracked_files(&self) -> GitResult<Vec<PathBuf>> {
        Ok(self
            .statuses(true)?
            .into_iter()
            .filter(|(_, status)| status.is_wt_new())
            .map(|(path, _)| PathBuf::from(path))
            .collect())
    }

    fn status_text(&self) -> GitResult<String> {
        let mut text = match self.current_branch()? {
            Some(branch) => format!("On branch {}\n", branch),
            None => "HEAD detached\n".to_string(),
        };

        let entries = self.statuses(true)?;
        if entries.is_empty() {
            text.push_str("nothing to commit, working tree clean");
        } else {
            for (path, status) in entries {
                text.push_str(&format!("{} {}\n", short_status(status), path));
            }
        }
        Ok(text)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn stage(&mut self, selection: &StageSelection) -> GitResult<()> {
        let mut index = self.repo.index().map_err(|e| self.fail(e))?;

        match selection {
            StageSelection::All => {
                // add -A: new and modified files, then deletions
                index
                    .add_all(["*"], IndexAddOption::DEFAULT, None)
                    .map_err(|e| self.fail(e))?;
                index.update_all(["*"], None).map_err(|e| self.fail(e))?;
            }
            StageSelection::Paths(paths) => {
                for path in paths {
                    let absolute = self.path.join(path);
                    if absolute.is_dir() {
                        index
                            .add_all([path.as_path()], IndexAddOption::DEFAULT, None)
                            .map_err(|e| self.fail(e))?;
                    } else if absolute.exists() {
                        index.add_path(path).map_err(|e| self.fail(e))?;
                    } else if index.get_path(path, 0).is_some() {
                        index.remove_path(path).map_err(|e| self.fail(e))?;
                    } else {
                        return Err(GitError::OperationFailed(format!(
                            "pathspec '{}' did not match any files",
                            path.display()
                        )));
                    }
                }
            }
        }

        index.write().map_err(|e| self.fail(e))?;
        debug!(?selection, "Staged changes");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn commit(&mut self, message: &str) -> GitResult<CommitOutcome> {
        let mut index = self.repo.index().map_err(|e| self.fail(e))?;
        let tree_id = index.write_tree().map_err(|e| self.fail(e))?;
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());

        let unchanged = match parent {
            Some(ref parent) => parent.tree_id() == tree_id,
            None => index.is_empty(),
        };
        if unchanged {
            debug!("Nothing staged");
            return Ok(CommitOutcome::NothingToCommit);
        }

        let tree = self.repo.find_tree(tree_id).map_err(|e| self.fail(e))?;
        let signature = self.signature()?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(|e| self.fail(e))?;

        info!(sha = %oid, "Created commit");
        Ok(CommitOutcome::Committed(oid.to_string()))
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn fetch_all(&mut self) -> GitResult<()> {
        let names = self.repo.remotes().map_err(|e| self.fail(e))?;

        for name in names.iter().flatten() {
            let mut remote = self.repo.find_remote(name).map_err(|e| self.fail(e))?;
            let mut options = self.fetch_options();
            remote
                .fetch(&[] as &[&str], Some(&mut options), None)
                .map_err(|e| self.fail(e))?;
            debug!(remote = name, "Fetched");
        }

        Ok(())
    }

    fn remote_branches(&self) -> GitResult<Vec<String>> {
        let branches = self
            .repo
            .branches(Some(BranchType::Remote))
            .map_err(|e| self.fail(e))?;

        let mut names = Vec::new();
        for entry in branches {
            let (branch, _) = entry.map_err(|e| self.fail(e))?;
            let Some(full) = branch.name().map_err(|e| self.fail(e))? else {
                continue;
            };
            match full.split_once('/') {
                Some((_, "HEAD")) | None => {}
                Some((_, name)) => names.push(name.to_string()),
            }
        }
        Ok(names)
    }

    fn current_branch(&self) -> GitResult<Option<String>> {
        Ok(self
            .head_ref_name()?
            .map(|name| name.trim_start_matches("refs/heads/").to_string()))
    }

    fn is_head_detached(&self) -> GitResult<bool> {
        self.repo.head_detached().map_err(|e| self.fail(e))
    }

    fn upstream_up_to_date(&self) -> GitResult<bool> {
        let Some(name) = self.current_branch()? else {
            return Ok(false);
        };
        let Ok(branch) = self.repo.find_branch(&name, BranchType::Local) else {
            // Unborn
            return Ok(false);
        };
        let Ok(upstream) = branch.upstream() else {
            return Ok(false);
        };

        match (branch.get().target(), upstream.get().target()) {
            (Some(local), Some(remote)) => {
                let (ahead, behind) = self
                    .repo
                    .graph_ahead_behind(local, remote)
                    .map_err(|e| self.fail(e))?;
                Ok(ahead == 0 && behind == 0)
            }
            _ => Ok(false),
        }
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn hard_reset(&mut self) -> GitResult<()> {
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| self.fail(e))?;
        self.repo
            .reset(head.as_object(), ResetType::Hard, None)
            .map_err(|e| self.fail(e))?;
        info!("Discarded local changes");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %self.path.display(), remote = %remote))]
    fn configure_origin(&mut self, remote: &AuthenticatedRemote) -> GitResult<()> {
        let result = match self.repo.find_remote(ORIGIN) {
            Ok(_) => self.repo.remote_set_url(ORIGIN, remote.credentialed_url()),
            Err(_) => self
                .repo
                .remote(ORIGIN, remote.credentialed_url())
                .map(|_| ()),
        };
        self.remote = Some(remote.clone());
        result.map_err(|e| self.fail(e))?;
        debug!("Configured origin");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %self.path.display(), branch = %branch))]
    fn pull(&mut self, branch: &str) -> GitResult<PullOutcome> {
        let head_ref = self.head_ref_name()?.ok_or(GitError::DetachedHead)?;

        let mut origin = self
            .repo
            .find_remote(ORIGIN)
            .map_err(|_| GitError::NoRemote(ORIGIN.to_string()))?;
        let mut options = self.fetch_options();
        origin
            .fetch(&[] as &[&str], Some(&mut options), None)
            .map_err(|e| self.fail(e))?;
        drop(options);

        let tracking = format!("refs/remotes/{}/{}", ORIGIN, branch);
        let fetched_ref = self
            .repo
            .find_reference(&tracking)
            .map_err(|_| GitError::RemoteRefNotFound(branch.to_string()))?;
        let fetched = self
            .repo
            .reference_to_annotated_commit(&fetched_ref)
            .map_err(|e| self.fail(e))?;
        let (analysis, _) = self
            .repo
            .merge_analysis(&[&fetched])
            .map_err(|e| self.fail(e))?;

        if analysis.is_up_to_date() {
            info!("Already up to date");
            return Ok(PullOutcome::AlreadyUpToDate);
        }

        if analysis.is_unborn() || analysis.is_fast_forward() {
            self.fast_forward(&head_ref, fetched.id(), analysis.is_unborn())?;
        } else if analysis.is_normal() {
            self.merge_commit(branch, &fetched)?;
        } else {
            return Err(GitError::OperationFailed(format!(
                "cannot merge '{}' into the current branch",
                branch
            )));
        }

        info!("Received changes");
        Ok(PullOutcome::ChangesReceived)
    }

    #[instrument(skip_all, fields(path = %self.path.display(), local = %local, remote_branch = %remote_branch))]
    fn push(&mut self, local: &str, remote_branch: &str) -> GitResult<PushOutcome> {
        let mut origin = self
            .repo
            .find_remote(ORIGIN)
            .map_err(|_| GitError::NoRemote(ORIGIN.to_string()))?;

        let rejections: RefCell<Vec<String>> = RefCell::new(Vec::new());
        let mut callbacks = remote_callbacks(self.credential());
        callbacks.push_update_reference(|refname, status| {
            if let Some(status) = status {
                rejections
                    .borrow_mut()
                    .push(format!("{} ({})", refname, status));
            }
            Ok(())
        });
        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let refspec = format!("refs/heads/{}:refs/heads/{}", local, remote_branch);
        match origin.push(&[refspec.as_str()], Some(&mut options)) {
            Ok(()) => {}
            Err(e) if e.code() == ErrorCode::NotFastForward => {
                warn!("Push rejected as non-fast-forward");
                return Ok(PushOutcome::Rejected(self.redact(e.message())));
            }
            Err(e) => return Err(self.fail(e)),
        }
        drop(options);

        let rejections = rejections.into_inner();
        if !rejections.is_empty() {
            let reason = self.redact(&rejections.join(", "));
            warn!(%reason, "Push rejected");
            return Ok(PushOutcome::Rejected(reason));
        }

        // Keep the remote-tracking ref in step with what was pushed
        if let Ok(head) = self.repo.refname_to_id(&format!("refs/heads/{}", local)) {
            let tracking = format!("refs/remotes/{}/{}", ORIGIN, remote_branch);
            if let Err(e) = self.repo.reference(&tracking, head, true, "push") {
                warn!(error = %self.redact(e.message()), "Failed to update tracking ref");
            }
        }

        info!("Pushed");
        Ok(PushOutcome::Pushed)
    }
}

/// Credential callback that answers with the token exactly once
fn remote_callbacks(token: Option<&SecretToken>) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(token) = token {
        let mut attempts = 0u8;
        callbacks.credentials(move |_url, _username, _allowed| {
            attempts += 1;
            if attempts > 1 {
                // libgit2 keeps asking while the server says no
                return Err(git2::Error::from_str("authentication rejected for token"));
            }
            Cred::userpass_plaintext("x-access-token", token.expose())
        });
    }
    callbacks
}

fn classify(err: &git2::Error, redact: impl Fn(&str) -> String) -> GitError {
    let message = redact(err.message());

    if err.code() == ErrorCode::Auth
        || message.to_lowercase().contains("authentication")
        || (err.class() == ErrorClass::Http && message.contains("401"))
    {
        return GitError::Authentication(message);
    }

    match err.code() {
        ErrorCode::NotFastForward => GitError::Rejected(message),
        _ => GitError::OperationFailed(message),
    }
}

/// Two-column code in the style of `git status --short`
fn short_status(status: Status) -> String {
    if status.is_conflicted() {
        return "UU".to_string();
    }
    if status.is_wt_new() && !status.is_index_new() {
        return "??".to_string();
    }

    let index = if status.is_index_new() {
        'A'
    } else if status.is_index_modified() {
        'M'
    } else if status.is_index_deleted() {
        'D'
    } else if status.is_index_renamed() {
        'R'
    } else if status.is_index_typechange() {
        'T'
    } else {
        ' '
    };
    let worktree = if status.is_wt_modified() {
        'M'
    } else if status.is_wt_deleted() {
        'D'
    } else if status.is_wt_renamed() {
        'R'
    } else if status.is_wt_typechange() {
        'T'
    } else {
        ' '
    };

    format!("{}{}", index, worktree)
}
