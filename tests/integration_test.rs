//! End-to-end flows against real repositories on disk
//!
//! Remotes are bare repositories in temp directories, so nothing here needs
//! the network or a token with real scopes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{Repository, RepositoryInitOptions};
use tempfile::TempDir;

use hub_commander::ErrorKind;
use hub_commander::flow::{Answer, CommitFlow, Flow, FlowContext, FlowOutcome, Prompt, PullFlow, PushFlow, Step};
use hub_commander::git::{CommitOutcome, Git2Opener, StageSelection, WorkingCopy, WorkingCopyOpener};
use hub_commander::session::{RepoId, RepositorySummary, SecretToken, Session, UserProfile};

const DEFAULT_MESSAGE: &str = "Commit made from hub-commander";

fn session() -> Session {
    let user = UserProfile {
        login: "octo".into(),
        name: Some("Octo Cat".into()),
        email: None,
        avatar_url: None,
    };
    Session::new(SecretToken::new("ghp_integration"), user)
}

fn opener(session: &Session) -> Arc<Git2Opener> {
    Arc::new(Git2Opener::new(None, Some(session.commit_identity())))
}

fn repository(clone_url: &str) -> RepositorySummary {
    RepositorySummary {
        id: RepoId::new("octo", "demo"),
        name: "demo".into(),
        url: "https://api.github.com/repos/octo/demo".into(),
        clone_url: clone_url.into(),
        html_url: "https://github.com/octo/demo".into(),
        private: false,
        default_branch: "main".into(),
        description: None,
    }
}

fn context(local_path: &Path, clone_url: &str) -> FlowContext {
    let session = session();
    FlowContext {
        opener: opener(&session),
        repository: repository(clone_url),
        local_path: Some(local_path.to_path_buf()),
        proposed_path: None,
        default_commit_message: DEFAULT_MESSAGE.to_string(),
        session,
    }
}

fn init_on(path: &Path, branch: &str) {
    let mut options = RepositoryInitOptions::new();
    options.initial_head(branch);
    Repository::init_opts(path, &options).unwrap();
}

fn commit_file(wc: &mut Box<dyn WorkingCopy>, name: &str, contents: &str) {
    fs::write(wc.path().join(name), contents).unwrap();
    wc.stage(&StageSelection::All).unwrap();
    assert!(matches!(
        wc.commit(&format!("add {}", name)).unwrap(),
        CommitOutcome::Committed(_)
    ));
}

/// Bare remote holding branches `dev` and `release`
fn remote_with_dev_and_release(root: &Path) -> PathBuf {
    let bare = root.join("remote.git");
    Repository::init_bare(&bare).unwrap();

    let seed_path = root.join("seed");
    init_on(&seed_path, "dev");
    Repository::open(&seed_path)
        .unwrap()
        .remote("origin", bare.to_str().unwrap())
        .unwrap();

    let mut seed = opener(&session()).open(&seed_path).unwrap();
    commit_file(&mut seed, "README.md", "seed\n");
    seed.push("dev", "dev").unwrap();

    let repo = Repository::open(&seed_path).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    repo.branch("release", &head, false).unwrap();
    seed.push("release", "release").unwrap();

    Repository::open_bare(&bare)
        .unwrap()
        .set_head("refs/heads/dev")
        .unwrap();
    bare
}

#[test]
fn test_commit_untracked_file_with_blank_answers_uses_default_message() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("demo");
    init_on(&path, "main");
    fs::write(path.join("a.txt"), "a\n").unwrap();

    let mut flow = CommitFlow::new(context(&path, "https://github.com/octo/demo.git"));

    assert!(matches!(flow.start().unwrap(), Step::Ask(Prompt::Text { .. })));
    assert!(matches!(
        flow.resume(Answer::Text(String::new())).unwrap(),
        Step::Ask(Prompt::Text { .. })
    ));
    let step = flow.resume(Answer::Text(String::new())).unwrap();

    match step {
        Step::Done(FlowOutcome::Committed { message, .. }) => assert_eq!(message, DEFAULT_MESSAGE),
        other => panic!("unexpected step {:?}", other),
    }
    assert_eq!(flow.local_path(), Some(path.as_path()));

    let repo = Repository::open(&path).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.message(), Some(DEFAULT_MESSAGE));
    assert_eq!(head.author().name(), Some("Octo Cat"));
    assert_eq!(head.author().email(), Some("octo@users.noreply.github.com"));
    assert!(head.tree().unwrap().get_name("a.txt").is_some());
}

#[test]
fn test_commit_clean_working_copy_is_noop() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("demo");
    init_on(&path, "main");

    let mut flow = CommitFlow::new(context(&path, "https://github.com/octo/demo.git"));
    assert!(matches!(flow.start().unwrap(), Step::Done(FlowOutcome::NoOp(_))));
    assert!(Repository::open(&path).unwrap().head().is_err());
}

#[test]
fn test_pull_of_branch_missing_on_remote_is_invalid() {
    let temp = TempDir::new().unwrap();
    let bare = remote_with_dev_and_release(temp.path());

    let local_path = temp.path().join("local");
    init_on(&local_path, "main");
    Repository::open(&local_path)
        .unwrap()
        .remote("origin", bare.to_str().unwrap())
        .unwrap();
    let mut local = opener(&session()).open(&local_path).unwrap();
    commit_file(&mut local, "local.txt", "mine\n");
    let before = Repository::open(&local_path)
        .unwrap()
        .head()
        .unwrap()
        .target()
        .unwrap();

    let mut flow = PullFlow::new(context(&local_path, bare.to_str().unwrap()));
    match flow.start().unwrap() {
        Step::Ask(Prompt::Select { options, initial, .. }) => {
            assert_eq!(options, vec!["dev".to_string(), "release".to_string()]);
            assert_eq!(initial, None);
        }
        other => panic!("unexpected step {:?}", other),
    }

    let step = flow.resume(Answer::Text("main".into())).unwrap();
    assert!(matches!(step, Step::Done(FlowOutcome::Invalid(_))));

    let repo = Repository::open(&local_path).unwrap();
    assert_eq!(repo.head().unwrap().target().unwrap(), before);
    assert!(repo.find_reference("refs/remotes/origin/dev").is_ok());
    assert!(repo.find_reference("refs/remotes/origin/main").is_err());
    // origin was not rewritten for a pull that never happened
    assert_eq!(
        repo.find_remote("origin").unwrap().url(),
        bare.to_str()
    );
}

#[test]
fn test_push_fresh_clone_is_up_to_date() {
    let temp = TempDir::new().unwrap();
    let bare = remote_with_dev_and_release(temp.path());
    let url = bare.to_str().unwrap();

    let clone_path = temp.path().join("clone");
    opener(&session()).clone_repo(url, &clone_path).unwrap();

    let mut flow = PushFlow::new(context(&clone_path, url));
    assert!(matches!(flow.start().unwrap(), Step::Done(FlowOutcome::NoOp(_))));
}

#[test]
fn test_pull_on_plain_directory_is_local_state_error() {
    let temp = TempDir::new().unwrap();
    let mut flow = PullFlow::new(context(temp.path(), "https://github.com/octo/demo.git"));

    let err = flow.start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LocalStateError);
}
