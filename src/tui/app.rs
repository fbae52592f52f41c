//! Main TUI application
//!
//! Event-driven application that coordinates:
//! - Terminal rendering with ratatui
//! - User input, routed to the open modal first
//! - Remote calls and flow steps running off the input loop
//!
//! Writes to a repository hold its [`OperationGuard`] until their result has
//! been posted, so a second operation on the same repository is refused.

use std::future::Future;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tracing::{debug, info, warn};

use super::event::{AppEvent, EventLoop, FlowTask, InputEvent, StateUpdate, UserCommand, post};
use super::modal::{Modal, ModalAction, ModalResult};
use super::theme::Theme;
use super::widgets::{BranchList, Detail, ListNavState, RepoList, ScrollState};
use crate::config::{AppState, Config};
use crate::error::{Error, Result, TuiError};
use crate::flow::{
    Answer, CommitFlow, Flow, FlowContext, OperationGuard, Prompt, PullFlow, PushFlow, Step,
    path_answer,
};
use crate::git::{Git2Opener, WorkingCopyOpener};
use crate::github::{GitHubClient, RepositoryHost};
use crate::session::{Branch, RepoId, RepositorySummary, SecretToken, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusedPane {
    #[default]
    Repositories,
    Branches,
}

#[derive(Debug, Clone, Copy)]
enum FlowKind {
    Commit,
    Pull,
    Push,
}

/// Application UI state
#[derive(Debug, Default)]
pub struct AppUiState {
    pub repo_nav: ListNavState,
    pub branch_nav: ListNavState,
    pub focused_pane: FocusedPane,
    pub modal: Option<Modal>,
    /// Typing into the filter
    pub filtering: bool,
    /// Branches of the repository they were fetched for
    pub branches: Option<(RepoId, Vec<Branch>)>,
    pub detail_scroll: ScrollState,
    pub status_message: Option<String>,
    /// Flow waiting for the answer to the open modal
    pub active_flow: Option<FlowTask>,
    pub login_pending: bool,
    pub should_quit: bool,
}

/// Main TUI application
pub struct App {
    config: Config,
    state: AppState,
    host: Option<Arc<dyn RepositoryHost>>,
    /// Token from the command line or environment, tried before prompting
    initial_token: Option<SecretToken>,
    ui: AppUiState,
    event_loop: EventLoop,
    theme: Theme,
}

impl App {
    pub fn new(config: Config, state: AppState, initial_token: Option<SecretToken>) -> Self {
        Self {
            config,
            state,
            host: None,
            initial_token,
            ui: AppUiState::default(),
            event_loop: EventLoop::new(),
            theme: Theme::default(),
        }
    }

    /// Run until the user quits
    pub async fn run(&mut self) -> Result<()> {
        let fps = u64::from(self.config.ui_refresh_fps.max(1));
        self.event_loop.start(Duration::from_millis(1000 / fps));

        match self.initial_token.take() {
            Some(token) => self.login(token),
            None => self.ui.modal = Some(Modal::login()),
        }

        let mut terminal = setup_terminal()?;
        info!("Entering main loop");
        let result = self.main_loop(&mut terminal).await;
        restore_terminal(&mut terminal)?;
        info!("Terminal restored");

        result
    }

    async fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal
                .draw(|f| self.render(f))
                .map_err(|e| TuiError::RenderError(e.to_string()))?;

            match self.event_loop.next().await {
                Some(AppEvent::Input(input)) => self.handle_input(input),
                Some(AppEvent::StateUpdate(update)) => self.handle_state_update(update),
                Some(AppEvent::Tick) => {}
                Some(AppEvent::Quit) | None => self.ui.should_quit = true,
            }

            if self.ui.should_quit {
                break;
            }
        }

        Ok(())
    }

    // ----- background work -----

    fn host(&mut self) -> Option<Arc<dyn RepositoryHost>> {
        if self.host.is_none() {
            self.ui.status_message = Some("Not signed in".to_string());
        }
        self.host.clone()
    }

    /// Run `work` on the runtime; the guard is released after the result is posted
    fn spawn_remote<Fut>(&self, guard: Option<OperationGuard>, work: Fut)
    where
        Fut: Future<Output = StateUpdate> + Send + 'static,
    {
        let tx = self.event_loop.sender();
        tokio::spawn(async move {
            let update = work.await;
            post(&tx, update).await;
            drop(guard);
        });
    }

    /// Lock `id` for a write, reporting a busy repository
    fn lock(&mut self, id: &RepoId) -> Option<OperationGuard> {
        match self.state.locks.acquire(id) {
            Ok(guard) => Some(guard),
            Err(e) => {
                self.show_error(&e.into());
                None
            }
        }
    }

    fn login(&mut self, token: SecretToken) {
        if token.is_empty() {
            self.ui.modal = Some(Modal::login());
            return;
        }

        let client = match GitHubClient::new(&self.config, token.clone()) {
            Ok(client) => client,
            Err(e) => {
                self.show_error(&e.into());
                return;
            }
        };
        let host: Arc<dyn RepositoryHost> = Arc::new(client);
        self.host = Some(Arc::clone(&host));
        self.ui.login_pending = true;
        self.ui.status_message = Some("Verifying token...".to_string());

        self.spawn_remote(None, async move {
            match host.current_user().await {
                Ok(user) => StateUpdate::LoggedIn {
                    session: Session::new(token, user),
                },
                Err(e) => StateUpdate::LoginFailed(e.into()),
            }
        });
    }

    fn refresh(&mut self) {
        let Some(host) = self.host() else { return };
        let request = self.state.begin_list_request();
        self.ui.status_message = Some("Loading repositories...".to_string());
        self.spawn_remote(None, async move {
            match host.list_repos().await {
                Ok(repositories) => StateUpdate::RepositoriesLoaded {
                    request,
                    repositories,
                },
                Err(e) => StateUpdate::Failed(e.into()),
            }
        });
    }

    fn load_details(&mut self, id: RepoId) {
        let Some(host) = self.host() else { return };
        self.spawn_remote(None, async move {
            match host.repo_details(&id).await {
                Ok(details) => StateUpdate::DetailsLoaded { id, details },
                Err(e) => StateUpdate::Failed(e.into()),
            }
        });
    }

    fn load_branches(&mut self, id: RepoId) {
        let Some(host) = self.host() else { return };
        let request = self.state.begin_branch_request(&id);
        self.spawn_remote(None, async move {
            match host.list_branches(&id).await {
                Ok(branches) => StateUpdate::BranchesLoaded {
                    id,
                    request,
                    branches,
                },
                Err(e) => StateUpdate::Failed(e.into()),
            }
        });
    }

    fn create_repo(&mut self, name: String, description: String, private: bool) {
        let Some(host) = self.host() else { return };
        self.spawn_remote(None, async move {
            match host.create_repo(&name, &description, private).await {
                Ok(repo) => StateUpdate::RepositoryChanged {
                    message: format!("Created {}", repo.id),
                    id: repo.id,
                },
                Err(e) => StateUpdate::Failed(e.into()),
            }
        });
    }

    fn delete_repo(&mut self, id: RepoId) {
        let Some(host) = self.host() else { return };
        let Some(guard) = self.lock(&id) else { return };
        self.spawn_remote(Some(guard), async move {
            match host.delete_repo(&id).await {
                Ok(()) => StateUpdate::RepositoryChanged {
                    message: format!("Deleted {}", id),
                    id,
                },
                Err(e) => StateUpdate::Failed(e.into()),
            }
        });
    }

    fn set_visibility(&mut self, id: RepoId, private: bool) {
        let Some(host) = self.host() else { return };
        let Some(guard) = self.lock(&id) else { return };
        self.spawn_remote(Some(guard), async move {
            match host.set_visibility(&id, private).await {
                Ok(repo) => StateUpdate::RepositoryChanged {
                    message: format!("{} is now {}", repo.id, repo.visibility()),
                    id,
                },
                Err(e) => StateUpdate::Failed(e.into()),
            }
        });
    }

    fn create_branch(&mut self, id: RepoId, name: String) {
        let Some(host) = self.host() else { return };
        let Some(guard) = self.lock(&id) else { return };
        self.spawn_remote(Some(guard), async move {
            match host.create_branch(&id, &name).await {
                Ok(branch) => StateUpdate::BranchChanged {
                    message: format!("Created branch {}", branch.name),
                    id,
                },
                Err(e) => StateUpdate::Failed(e.into()),
            }
        });
    }

    fn delete_branch(&mut self, id: RepoId, name: String) {
        let Some(host) = self.host() else { return };
        let Some(guard) = self.lock(&id) else { return };
        self.spawn_remote(Some(guard), async move {
            match host.delete_branch(&id, &name).await {
                Ok(()) => StateUpdate::BranchChanged {
                    message: format!("Deleted branch {}", name),
                    id,
                },
                Err(e) => StateUpdate::Failed(e.into()),
            }
        });
    }

    fn set_default_branch(&mut self, id: RepoId, name: String) {
        let Some(host) = self.host() else { return };
        let Some(guard) = self.lock(&id) else { return };
        self.spawn_remote(Some(guard), async move {
            match host.set_default_branch(&id, &name).await {
                Ok(default) => StateUpdate::BranchChanged {
                    message: format!("Default branch is now {}", default),
                    id,
                },
                Err(e) => StateUpdate::Failed(e.into()),
            }
        });
    }

    fn opener(&self, session: &Session) -> Git2Opener {
        Git2Opener::new(Some(session.token().clone()), Some(session.commit_identity()))
    }

    fn clone_repo(&mut self, repo: RepositorySummary, path: PathBuf) {
        let Some(session) = self.state.session() else { return };
        let opener = self.opener(session);
        let Some(guard) = self.lock(&repo.id) else { return };
        self.ui.status_message = Some(format!("Cloning {}...", repo.id));

        self.spawn_remote(Some(guard), async move {
            let url = repo.clone_url.clone();
            let target = path.clone();
            let cloned =
                tokio::task::spawn_blocking(move || opener.clone_repo(&url, &target).map(|_| ()))
                    .await;
            match cloned {
                Ok(Ok(())) => StateUpdate::Cloned {
                    id: Some(repo.id),
                    path,
                },
                Ok(Err(e)) => StateUpdate::Failed(e.into()),
                Err(e) => StateUpdate::Failed(TuiError::TaskFailed(e.to_string()).into()),
            }
        });
    }

    fn start_flow(&mut self, kind: FlowKind) {
        let Some(repo) = self.state.selected().cloned() else {
            self.ui.status_message = Some("Select a repository first".to_string());
            return;
        };
        let Some(session) = self.state.session().cloned() else { return };
        let Some(guard) = self.lock(&repo.id) else { return };

        let ctx = FlowContext {
            opener: Arc::new(self.opener(&session)),
            local_path: self.state.known_local_path(&repo.id).map(Path::to_path_buf),
            proposed_path: self.config.proposed_local_path(&repo.name),
            default_commit_message: self.config.default_commit_message.clone(),
            repository: repo,
            session,
        };
        let flow: Box<dyn Flow> = match kind {
            FlowKind::Commit => Box::new(CommitFlow::new(ctx)),
            FlowKind::Pull => Box::new(PullFlow::new(ctx)),
            FlowKind::Push => Box::new(PushFlow::new(ctx)),
        };

        debug!(flow = flow.name(), repo = %guard.repo(), "Starting flow");
        self.advance_flow(FlowTask { flow, guard }, None);
    }

    /// Run one flow step on the blocking pool
    fn advance_flow(&self, task: FlowTask, answer: Option<Answer>) {
        let tx = self.event_loop.sender();
        tokio::spawn(async move {
            let step = tokio::task::spawn_blocking(move || {
                let mut task = task;
                let result = match answer {
                    None => task.flow.start(),
                    Some(answer) => task.flow.resume(answer),
                };
                (task, result)
            })
            .await;

            let update = match step {
                Ok((task, result)) => StateUpdate::FlowProgress { task, result },
                // The task and its lock were dropped with the panicking step
                Err(e) => StateUpdate::Failed(TuiError::TaskFailed(e.to_string()).into()),
            };
            post(&tx, update).await;
        });
    }

    fn open_in_browser(&mut self, url: String) {
        self.spawn_remote(None, async move {
            match browser_command(&url).status().await {
                Ok(status) if status.success() => StateUpdate::Info(format!("Opened {}", url)),
                Ok(status) => StateUpdate::Failed(
                    TuiError::Platform(format!("Browser opener exited with {}", status)).into(),
                ),
                Err(e) => StateUpdate::Failed(e.into()),
            }
        });
    }

    fn copy_clone_url(&mut self, url: &str) {
        let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(url));
        self.ui.status_message = Some(match copied {
            Ok(()) => format!("Copied {}", url),
            Err(e) => {
                warn!("Clipboard unavailable: {}", e);
                format!("Could not copy to clipboard: {}", e)
            }
        });
    }

    // ----- state updates -----

    fn handle_state_update(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::LoggedIn { session } => {
                info!(login = %session.user().login, "Signed in");
                self.ui.login_pending = false;
                self.ui.status_message =
                    Some(format!("Signed in as {}", session.user().display_name()));
                self.state.set_session(session);
                self.refresh();
            }

            StateUpdate::LoginFailed(e) => {
                warn!("Sign-in failed: {}", e);
                self.ui.login_pending = false;
                self.host = None;
                self.show_error(&e);
            }

            StateUpdate::RepositoriesLoaded {
                request,
                repositories,
            } => {
                let count = repositories.len();
                if !self.state.apply_list_response(request, repositories) {
                    debug!(request, "Dropped superseded repository list");
                    return;
                }
                self.sync_repo_selection();
                self.ui.status_message = Some(format!("{} repositories", count));
            }

            StateUpdate::RepositoryChanged { id, message } => {
                info!(repo = %id, "{}", message);
                self.ui.status_message = Some(message);
                if matches!(&self.ui.branches, Some((branch_repo, _)) if *branch_repo == id) {
                    self.ui.branches = None;
                }
                self.state.mark_stale();
                self.refresh();
            }

            StateUpdate::DetailsLoaded { id, details } => {
                self.ui.modal = Some(Modal::message(id.to_string(), details.to_text()));
            }

            StateUpdate::BranchesLoaded {
                id,
                request,
                branches,
            } => {
                if !self.state.finish_branch_request(&id, request) {
                    debug!(repo = %id, request, "Dropped superseded branch list");
                    return;
                }
                self.ui.branch_nav.set_item_count(branches.len());
                self.ui.branches = Some((id, branches));
            }

            StateUpdate::BranchChanged { id, message } => {
                info!(repo = %id, "{}", message);
                self.ui.status_message = Some(message);
                // Any branch write may move the default marker
                self.load_branches(id);
                self.state.mark_stale();
                self.refresh();
            }

            StateUpdate::FlowProgress { task, result } => self.handle_flow_progress(task, result),

            StateUpdate::Cloned { id, path } => {
                self.ui.status_message = Some(format!("Cloned into {}", path.display()));
                if let Some(id) = id {
                    self.state.remember_local_path(id, path);
                }
            }

            StateUpdate::Failed(e) => {
                warn!("Operation failed: {}", e);
                self.show_error(&e);
            }

            StateUpdate::Info(message) => self.ui.status_message = Some(message),
        }
    }

    fn handle_flow_progress(&mut self, task: FlowTask, result: Result<Step>) {
        if let Some(path) = task.flow.local_path() {
            self.state
                .remember_local_path(task.guard.repo().clone(), path.to_path_buf());
        }

        match result {
            Ok(Step::Ask(prompt)) => {
                self.ui.modal = Some(Modal::from_prompt(prompt, ModalAction::Flow));
                self.ui.active_flow = Some(task);
            }
            Ok(Step::Done(outcome)) => {
                info!(flow = task.flow.name(), repo = %task.guard.repo(), %outcome, "Flow finished");
                self.ui.status_message = Some(outcome.to_string());
                if outcome.changed_something() {
                    self.ui.modal = Some(Modal::message(task.flow.name(), outcome.to_string()));
                }
            }
            Err(e) => {
                warn!(flow = task.flow.name(), repo = %task.guard.repo(), "Flow failed: {}", e);
                self.show_error(&e);
            }
        }
    }

    fn show_error(&mut self, error: &Error) {
        self.ui.status_message = Some(error.title().to_string());
        self.ui.modal = Some(Modal::error(error));
    }

    // ----- input -----

    fn handle_input(&mut self, input: InputEvent) {
        match input {
            InputEvent::Key(key) => {
                if self.ui.modal.is_some() {
                    self.handle_modal_key(key);
                } else if self.ui.filtering {
                    self.handle_filter_key(key);
                } else if let Some(cmd) = UserCommand::from_key(key) {
                    self.handle_command(cmd);
                }
            }
            InputEvent::Resize(_, _) | InputEvent::Mouse(_) => {}
        }
    }

    fn handle_modal_key(&mut self, key: KeyEvent) {
        let Some(modal) = self.ui.modal.as_mut() else { return };

        match modal.handle_key(key) {
            ModalResult::Open => {}
            ModalResult::Closed => {
                self.ui.modal = None;
                self.prompt_login_if_needed();
            }
            ModalResult::Answered(action, answer) => {
                self.ui.modal = None;
                self.handle_answer(action, answer);
                self.prompt_login_if_needed();
            }
        }
    }

    /// Without a session there is nothing to show but the sign-in prompt
    fn prompt_login_if_needed(&mut self) {
        if self.ui.modal.is_none() && self.state.session().is_none() && !self.ui.login_pending {
            self.ui.modal = Some(Modal::login());
        }
    }

    fn handle_answer(&mut self, action: ModalAction, answer: Answer) {
        match (action, answer) {
            (ModalAction::Flow, answer) => match self.ui.active_flow.take() {
                Some(task) => self.advance_flow(task, Some(answer)),
                None => debug!("Answer with no active flow"),
            },

            (ModalAction::Login, Answer::Text(token)) => {
                self.login(SecretToken::new(token.trim()))
            }
            (ModalAction::Login, _) => self.ui.should_quit = true,

            (ModalAction::CreateRepoName, Answer::Text(name)) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return;
                }
                self.ui.modal = Some(Modal::input(
                    "New repository",
                    format!("Description for {} (optional):", name),
                    ModalAction::CreateRepoDescription { name },
                ));
            }
            (ModalAction::CreateRepoDescription { name }, Answer::Text(description)) => {
                let prompt = Prompt::Select {
                    title: "New repository".to_string(),
                    message: format!("Visibility of {}:", name),
                    options: vec!["public".to_string(), "private".to_string()],
                    initial: Some(0),
                };
                self.ui.modal = Some(Modal::from_prompt(
                    prompt,
                    ModalAction::CreateRepoVisibility {
                        name,
                        description: description.trim().to_string(),
                    },
                ));
            }
            (ModalAction::CreateRepoVisibility { name, description }, Answer::Text(choice)) => {
                self.create_repo(name, description, choice == "private");
            }

            (ModalAction::DeleteRepo(id), Answer::Yes) => self.delete_repo(id),
            (ModalAction::SetVisibility { id, private }, Answer::Yes) => {
                self.set_visibility(id, private)
            }

            (ModalAction::CloneTo(id), answer) => match path_answer(answer) {
                Ok(Some(path)) => {
                    if let Some(repo) = self.state.repository(&id).cloned() {
                        self.clone_repo(repo, path);
                    }
                }
                Ok(None) => {}
                Err(e) => self.show_error(&e.into()),
            },

            (ModalAction::CreateBranch(id), Answer::Text(name)) => {
                let name = name.trim().to_string();
                if !name.is_empty() {
                    self.create_branch(id, name);
                }
            }
            (ModalAction::DeleteBranch { id, branch }, Answer::Yes) => self.delete_branch(id, branch),
            (ModalAction::SetDefaultBranch { id, branch }, Answer::Yes) => {
                self.set_default_branch(id, branch)
            }

            // Declined or dismissed
            _ => {}
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        let mut query = self.state.filter().to_string();
        match key.code {
            KeyCode::Enter => self.ui.filtering = false,
            KeyCode::Esc => {
                self.ui.filtering = false;
                query.clear();
            }
            KeyCode::Backspace => {
                query.pop();
            }
            KeyCode::Char(c) => query.push(c),
            _ => return,
        }

        if query != self.state.filter() {
            self.state.set_filter(query);
            self.ui.repo_nav.select(Some(0));
            self.sync_repo_selection();
        }
    }

    fn handle_command(&mut self, cmd: UserCommand) {
        let branch_pane = self.ui.focused_pane == FocusedPane::Branches;

        match cmd {
            UserCommand::NavigateUp | UserCommand::NavigateDown => {
                let nav = if branch_pane {
                    &mut self.ui.branch_nav
                } else {
                    &mut self.ui.repo_nav
                };
                if cmd == UserCommand::NavigateUp {
                    nav.previous();
                } else {
                    nav.next();
                }
                if !branch_pane {
                    self.sync_repo_selection();
                }
            }

            UserCommand::Select => {
                if let Some(id) = self.selected_id() {
                    self.load_details(id);
                }
            }
            UserCommand::Filter => self.ui.filtering = true,
            UserCommand::Refresh => self.refresh(),
            UserCommand::SwitchPane => {
                self.ui.focused_pane = if branch_pane {
                    FocusedPane::Repositories
                } else {
                    FocusedPane::Branches
                };
            }

            UserCommand::New if branch_pane => {
                if let Some(id) = self.selected_id() {
                    self.ui.modal = Some(Modal::input(
                        "New branch",
                        format!("Branch name (created from the default branch of {}):", id),
                        ModalAction::CreateBranch(id),
                    ));
                }
            }
            UserCommand::New => {
                self.ui.modal = Some(Modal::input(
                    "New repository",
                    "Repository name:",
                    ModalAction::CreateRepoName,
                ));
            }

            UserCommand::Delete if branch_pane => {
                if let Some((id, branch)) = self.selected_branch() {
                    self.ui.modal = Some(Modal::confirm(
                        "Delete branch",
                        format!("Delete branch '{}' from {}?", branch.name, id),
                        ModalAction::DeleteBranch {
                            id,
                            branch: branch.name,
                        },
                    ));
                }
            }
            UserCommand::Delete => {
                if let Some(id) = self.selected_id() {
                    self.ui.modal = Some(Modal::confirm(
                        "Delete repository",
                        format!("Permanently delete {}? This cannot be undone.", id),
                        ModalAction::DeleteRepo(id),
                    ));
                }
            }

            UserCommand::SetDefault => {
                if let Some((id, branch)) = self.selected_branch() {
                    self.ui.modal = Some(Modal::confirm(
                        "Default branch",
                        format!("Make '{}' the default branch of {}?", branch.name, id),
                        ModalAction::SetDefaultBranch {
                            id,
                            branch: branch.name,
                        },
                    ));
                }
            }

            UserCommand::ToggleVisibility => {
                if let Some(repo) = self.state.selected() {
                    let private = !repo.private;
                    let target = if private { "private" } else { "public" };
                    let modal = Modal::confirm(
                        "Visibility",
                        format!("Make {} {}?", repo.id, target),
                        ModalAction::SetVisibility {
                            id: repo.id.clone(),
                            private,
                        },
                    );
                    self.ui.modal = Some(modal);
                }
            }

            UserCommand::Branches => {
                if let Some(id) = self.selected_id() {
                    self.ui.focused_pane = FocusedPane::Branches;
                    self.load_branches(id);
                }
            }

            UserCommand::Commit => self.start_flow(FlowKind::Commit),
            UserCommand::Pull => self.start_flow(FlowKind::Pull),
            UserCommand::Push => self.start_flow(FlowKind::Push),

            UserCommand::OpenBrowser => {
                if let Some(url) = self.state.selected().map(|r| r.html_url.clone()) {
                    self.open_in_browser(url);
                }
            }
            UserCommand::CopyUrl => {
                if let Some(url) = self.state.selected().map(|r| r.clone_url.clone()) {
                    self.copy_clone_url(&url);
                }
            }
            UserCommand::Clone => {
                if let Some(repo) = self.state.selected() {
                    let initial = self
                        .config
                        .proposed_local_path(&repo.name)
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    self.ui.modal = Some(Modal::Input {
                        title: "Clone".to_string(),
                        message: format!("Clone {} into:", repo.id),
                        value: initial,
                        masked: false,
                        action: ModalAction::CloneTo(repo.id.clone()),
                    });
                }
            }

            UserCommand::ScrollUp => self.ui.detail_scroll.page_up(),
            UserCommand::ScrollDown => self.ui.detail_scroll.page_down(),
            UserCommand::ShowHelp => self.ui.modal = Some(Modal::Help),
            UserCommand::Quit => self.ui.should_quit = true,
            UserCommand::Cancel => {
                if branch_pane {
                    self.ui.focused_pane = FocusedPane::Repositories;
                }
            }
        }
    }

    fn selected_id(&self) -> Option<RepoId> {
        self.state.selected().map(|r| r.id.clone())
    }

    /// Highlighted branch, only if the list belongs to the selected repository
    fn selected_branch(&self) -> Option<(RepoId, Branch)> {
        let (id, branches) = self.ui.branches.as_ref()?;
        if Some(id) != self.state.selected().map(|r| &r.id) {
            return None;
        }
        let branch = branches.get(self.ui.branch_nav.selected()?)?;
        Some((id.clone(), branch.clone()))
    }

    /// Keep `AppState::selected` in step with the highlighted row
    fn sync_repo_selection(&mut self) {
        let visible = self.state.visible_repositories();
        self.ui.repo_nav.set_item_count(visible.len());
        let id = self
            .ui
            .repo_nav
            .selected()
            .and_then(|i| visible.get(i))
            .map(|r| r.id.clone());

        if id != self.selected_id() {
            self.ui.detail_scroll.reset();
        }
        self.state.select(id);
    }

    // ----- rendering -----

    fn render(&mut self, frame: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(frame.area());

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(rows[0]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(columns[1]);

        self.render_repo_list(frame, columns[0]);
        self.render_detail(frame, right[0]);
        self.render_branches(frame, right[1]);
        self.render_status_bar(frame, rows[1]);

        let area = frame.area();
        if let Some(modal) = self.ui.modal.as_mut() {
            modal.render(frame, area, &self.theme);
        }
    }

    fn render_repo_list(&mut self, frame: &mut Frame, area: Rect) {
        let focused = self.ui.focused_pane == FocusedPane::Repositories;
        let visible = self.state.visible_repositories();

        let title = match (self.state.filter(), self.ui.filtering) {
            ("", false) => format!(" Repositories ({}) ", visible.len()),
            (query, _) => format!(" Repositories ({}) /{} ", visible.len(), query),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(self.theme.border(focused));

        let list = RepoList::new(&visible, &self.state.locks, &self.theme).block(block);
        frame.render_stateful_widget(list, area, &mut self.ui.repo_nav.list_state);
    }

    fn render_detail(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Repository ")
            .borders(Borders::ALL)
            .border_style(self.theme.border(false));

        let Some(repo) = self.state.selected() else {
            let hint = if self.state.session().is_none() {
                "Not signed in"
            } else {
                "No repository selected"
            };
            frame.render_widget(Detail::new(hint).block(block), area);
            return;
        };

        let label = self.theme.secondary();
        let field = |name: &'static str, value: String| {
            Line::from(vec![Span::styled(format!("{:<16}", name), label), Span::raw(value)])
        };

        let local_path = self
            .state
            .known_local_path(&repo.id)
            .map_or_else(|| "not set".to_string(), |p| p.display().to_string());

        let mut lines = vec![
            Line::from(Span::styled(
                repo.id.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled(format!("{:<16}", "Visibility"), label),
                Span::styled(repo.visibility(), self.theme.visibility(repo.private)),
            ]),
            Line::from(vec![
                Span::styled(format!("{:<16}", "Default branch"), label),
                match self.state.current_default_branch(&repo.id) {
                    Some(branch) => Span::styled(
                        branch.to_string(),
                        Style::default().fg(self.theme.default_branch),
                    ),
                    None => Span::styled("refreshing...", Style::default().fg(self.theme.busy)),
                },
            ]),
            field("Clone URL", repo.clone_url.clone()),
            field("Web", repo.html_url.clone()),
            field("Local path", local_path),
        ];
        if let Some(description) = repo.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(Line::from(""));
            lines.push(Line::from(description.to_string()));
        }
        if self.state.locks.is_locked(&repo.id) {
            lines.push(Line::from(""));
            lines.push(Line::styled(
                "Operation in progress",
                Style::default().fg(self.theme.busy),
            ));
        }

        let content: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        self.ui
            .detail_scroll
            .set_content(&content, block.inner(area).height);
        frame.render_widget(
            Detail::new(lines)
                .block(block)
                .scroll(self.ui.detail_scroll.offset),
            area,
        );
    }

    fn render_branches(&mut self, frame: &mut Frame, area: Rect) {
        let focused = self.ui.focused_pane == FocusedPane::Branches;
        let block = Block::default()
            .title(" Branches ")
            .borders(Borders::ALL)
            .border_style(self.theme.border(focused));

        let selected = self.state.selected().map(|r| &r.id);
        match &self.ui.branches {
            Some((id, branches)) if Some(id) == selected => {
                let refreshing = self.state.is_stale() || self.state.branches_pending(id);
                let list = BranchList::new(branches, &self.theme)
                    .refreshing(refreshing)
                    .block(block);
                frame.render_stateful_widget(list, area, &mut self.ui.branch_nav.list_state);
            }
            _ => {
                let hint = Paragraph::new("Press b to load branches")
                    .style(self.theme.secondary())
                    .block(block);
                frame.render_widget(hint, area);
            }
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let user = self
            .state
            .session()
            .map_or("not signed in", |s| s.user().login.as_str());

        let status = if self.ui.filtering {
            format!("/{}_  [Enter] keep  [Esc] clear", self.state.filter())
        } else {
            self.ui
                .status_message
                .clone()
                .unwrap_or_else(|| "? help  q quit".to_string())
        };

        let paragraph = Paragraph::new(format!(" {} | {}", user, status)).style(self.theme.status_bar());
        frame.render_widget(paragraph, area);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().map_err(|e| TuiError::InitFailed(e.to_string()))?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .map_err(|e| TuiError::InitFailed(e.to_string()))?;

    Terminal::new(CrosstermBackend::new(stdout))
        .map_err(|e| TuiError::InitFailed(e.to_string()).into())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().map_err(|e| TuiError::RestoreFailed(e.to_string()))?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .map_err(|e| TuiError::RestoreFailed(e.to_string()))?;
    terminal
        .show_cursor()
        .map_err(|e| TuiError::RestoreFailed(e.to_string()))?;
    Ok(())
}

/// Platform command that opens `url` in the default browser
fn browser_command(url: &str) -> tokio::process::Command {
    let mut command = if cfg!(target_os = "macos") {
        tokio::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = tokio::process::Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        tokio::process::Command::new("xdg-open")
    };
    command.arg(url);
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::flow::FlowOutcome;
    use crate::github::RemoteResult;
    use crate::session::{RepositoryDetails, UserProfile, sample_repo};
    use async_trait::async_trait;
    use ratatui::backend::TestBackend;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FakeHost {
        calls: Mutex<Vec<String>>,
        /// Remote default branch, `main` until changed
        remote_default: Mutex<Option<String>>,
        /// Delay the first `list_repos` answer
        slow_first_list: AtomicBool,
    }

    impl FakeHost {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn remote_default(&self) -> String {
            self.remote_default
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| "main".to_string())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RepositoryHost for FakeHost {
        async fn current_user(&self) -> RemoteResult<UserProfile> {
            self.record("current_user");
            Ok(profile())
        }

        async fn list_repos(&self) -> RemoteResult<Vec<RepositorySummary>> {
            self.record("list_repos");
            let mut repo = sample_repo("octo", "demo");
            repo.default_branch = self.remote_default();
            if self.slow_first_list.swap(false, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            Ok(vec![repo])
        }

        async fn repo_details(&self, _id: &RepoId) -> RemoteResult<RepositoryDetails> {
            Err(RemoteError::NotFound("repository".into()))
        }

        async fn create_repo(
            &self,
            name: &str,
            _description: &str,
            _private: bool,
        ) -> RemoteResult<RepositorySummary> {
            self.record(format!("create_repo {}", name));
            Ok(sample_repo("octo", name))
        }

        async fn delete_repo(&self, id: &RepoId) -> RemoteResult<()> {
            self.record(format!("delete_repo {}", id));
            Ok(())
        }

        async fn set_visibility(&self, id: &RepoId, private: bool) -> RemoteResult<RepositorySummary> {
            self.record(format!("set_visibility {}", private));
            let mut repo = sample_repo(id.owner(), id.name());
            repo.private = private;
            Ok(repo)
        }

        async fn list_branches(&self, _id: &RepoId) -> RemoteResult<Vec<Branch>> {
            self.record("list_branches");
            Ok(vec![Branch {
                name: "main".into(),
                is_default: true,
            }])
        }

        async fn delete_branch(&self, _id: &RepoId, name: &str) -> RemoteResult<()> {
            self.record(format!("delete_branch {}", name));
            Ok(())
        }

        async fn default_branch(&self, _id: &RepoId) -> RemoteResult<String> {
            Ok("main".into())
        }

        async fn set_default_branch(&self, _id: &RepoId, name: &str) -> RemoteResult<String> {
            self.record(format!("set_default_branch {}", name));
            *self.remote_default.lock().unwrap() = Some(name.to_string());
            Ok(name.to_string())
        }

        async fn create_branch(&self, _id: &RepoId, name: &str) -> RemoteResult<Branch> {
            Ok(Branch {
                name: name.to_string(),
                is_default: false,
            })
        }
    }

    fn profile() -> UserProfile {
        UserProfile {
            login: "octo".into(),
            name: None,
            email: None,
            avatar_url: None,
        }
    }

    fn signed_in_app(host: Arc<FakeHost>) -> App {
        let mut app = App::new(Config::default(), AppState::new(), None);
        app.host = Some(host as Arc<dyn RepositoryHost>);
        app.state
            .set_session(Session::new(SecretToken::new("ghp_test"), profile()));
        app.state.set_repositories(vec![sample_repo("octo", "demo")]);
        app.sync_repo_selection();
        app
    }

    /// Apply posted updates until `done` says stop
    async fn pump(app: &mut App, mut done: impl FnMut(&App) -> bool) {
        for _ in 0..20 {
            if done(app) {
                return;
            }
            match tokio::time::timeout(Duration::from_secs(5), app.event_loop.next()).await {
                Ok(Some(AppEvent::StateUpdate(update))) => app.handle_state_update(update),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        assert!(done(app), "condition not reached");
    }

    #[test]
    fn test_app_ui_state_default() {
        let state = AppUiState::default();
        assert!(state.modal.is_none());
        assert_eq!(state.focused_pane, FocusedPane::Repositories);
        assert!(!state.should_quit);
    }

    #[test]
    fn test_filter_narrows_selection() {
        let mut app = App::new(Config::default(), AppState::new(), None);
        app.state.set_repositories(vec![
            sample_repo("octo", "alpha"),
            sample_repo("octo", "beta"),
        ]);
        app.sync_repo_selection();
        assert_eq!(app.state.selected().map(|r| r.name.as_str()), Some("alpha"));

        app.ui.filtering = true;
        app.handle_filter_key(KeyEvent::from(KeyCode::Char('B')));
        assert_eq!(app.state.filter(), "B");
        assert_eq!(app.state.selected().map(|r| r.name.as_str()), Some("beta"));
        assert_eq!(app.ui.repo_nav.item_count, 1);

        app.handle_filter_key(KeyEvent::from(KeyCode::Esc));
        assert!(!app.ui.filtering);
        assert_eq!(app.ui.repo_nav.item_count, 2);
    }

    #[test]
    fn test_busy_repository_refuses_second_operation() {
        let mut app = App::new(Config::default(), AppState::new(), None);
        let id = RepoId::new("octo", "demo");
        let _held = app.state.locks.acquire(&id).unwrap();

        assert!(app.lock(&id).is_none());
        assert!(matches!(app.ui.modal, Some(Modal::Error { ref title, .. }) if title == "Busy"));
    }

    #[test]
    fn test_dismissed_login_quits() {
        let mut app = App::new(Config::default(), AppState::new(), None);
        app.handle_answer(ModalAction::Login, Answer::Dismissed);
        assert!(app.ui.should_quit);
    }

    #[test]
    fn test_closing_error_without_session_prompts_login() {
        let mut app = App::new(Config::default(), AppState::new(), None);
        app.show_error(&RemoteError::Authentication.into());
        app.handle_modal_key(KeyEvent::from(KeyCode::Enter));
        assert!(matches!(
            app.ui.modal,
            Some(Modal::Input {
                action: ModalAction::Login,
                masked: true,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_branch_delete_refreshes_branches_and_default() {
        let host = Arc::new(FakeHost::default());
        let mut app = signed_in_app(Arc::clone(&host));
        let id = RepoId::new("octo", "demo");

        app.handle_answer(
            ModalAction::DeleteBranch {
                id: id.clone(),
                branch: "feature/x".into(),
            },
            Answer::Yes,
        );
        pump(&mut app, |app| app.ui.branches.is_some() && !app.state.is_stale()).await;

        let calls = host.calls();
        assert!(calls.contains(&"delete_branch feature/x".to_string()));
        assert!(calls.contains(&"list_branches".to_string()));
        assert!(calls.contains(&"list_repos".to_string()));
        assert!(!app.state.locks.is_locked(&id));
    }

    #[tokio::test]
    async fn test_slow_refresh_does_not_overwrite_newer_default() {
        let host = Arc::new(FakeHost::default());
        host.slow_first_list.store(true, Ordering::SeqCst);
        let mut app = signed_in_app(Arc::clone(&host));
        let id = RepoId::new("octo", "demo");

        app.refresh();
        app.handle_answer(
            ModalAction::SetDefaultBranch {
                id: id.clone(),
                branch: "dev".into(),
            },
            Answer::Yes,
        );
        pump(&mut app, |app| app.state.current_default_branch(&id) == Some("dev")).await;

        // Let the first, slow answer land
        tokio::time::sleep(Duration::from_millis(400)).await;
        while let Some(event) = app.event_loop.try_next() {
            if let AppEvent::StateUpdate(update) = event {
                app.handle_state_update(update);
            }
        }

        let lists = host.calls().iter().filter(|c| *c == "list_repos").count();
        assert_eq!(lists, 2);
        assert_eq!(app.state.current_default_branch(&id), Some("dev"));
        assert!(!app.state.is_stale());
    }

    #[tokio::test]
    async fn test_default_branch_shown_as_refreshing_until_refetched() {
        let host = Arc::new(FakeHost::default());
        let mut app = signed_in_app(Arc::clone(&host));
        let id = RepoId::new("octo", "demo");
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        let screen = |terminal: &Terminal<TestBackend>| -> String {
            let buffer = terminal.backend().buffer();
            buffer.content().iter().map(|cell| cell.symbol()).collect()
        };

        terminal.draw(|frame| app.render(frame)).unwrap();
        assert!(!screen(&terminal).contains("refreshing..."));

        app.handle_state_update(StateUpdate::BranchChanged {
            id: id.clone(),
            message: "Default branch is now dev".into(),
        });
        assert_eq!(app.state.current_default_branch(&id), None);
        terminal.draw(|frame| app.render(frame)).unwrap();
        assert!(screen(&terminal).contains("refreshing..."));

        pump(&mut app, |app| !app.state.is_stale()).await;
        terminal.draw(|frame| app.render(frame)).unwrap();
        assert!(!screen(&terminal).contains("refreshing..."));
    }

    #[tokio::test]
    async fn test_declined_confirmation_makes_no_call() {
        let host = Arc::new(FakeHost::default());
        let mut app = signed_in_app(Arc::clone(&host));

        app.handle_answer(
            ModalAction::DeleteRepo(RepoId::new("octo", "demo")),
            Answer::No,
        );
        tokio::task::yield_now().await;
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_repo_walks_through_prompts() {
        let host = Arc::new(FakeHost::default());
        let mut app = signed_in_app(Arc::clone(&host));

        app.handle_answer(ModalAction::CreateRepoName, Answer::Text("fresh".into()));
        assert!(matches!(
            app.ui.modal,
            Some(Modal::Input {
                action: ModalAction::CreateRepoDescription { .. },
                ..
            })
        ));

        app.handle_answer(
            ModalAction::CreateRepoDescription {
                name: "fresh".into(),
            },
            Answer::Text("".into()),
        );
        assert!(matches!(app.ui.modal, Some(Modal::Select { .. })));

        app.ui.modal = None;
        app.handle_answer(
            ModalAction::CreateRepoVisibility {
                name: "fresh".into(),
                description: String::new(),
            },
            Answer::Text("private".into()),
        );
        pump(&mut app, |app| {
            app.ui.status_message.as_deref() == Some("1 repositories")
        })
        .await;
        assert!(host.calls().contains(&"create_repo fresh".to_string()));
    }

    #[tokio::test]
    async fn test_login_success_loads_repositories() {
        let host = Arc::new(FakeHost::default());
        let mut app = App::new(Config::default(), AppState::new(), None);
        app.host = Some(Arc::clone(&host) as Arc<dyn RepositoryHost>);

        let session = Session::new(SecretToken::new("ghp_test"), profile());
        app.handle_state_update(StateUpdate::LoggedIn { session });
        pump(&mut app, |app| !app.state.repositories().is_empty()).await;

        assert_eq!(app.state.selected().map(|r| r.name.as_str()), Some("demo"));
    }

    #[tokio::test]
    async fn test_flow_outcome_releases_lock() {
        let mut app = App::new(Config::default(), AppState::new(), None);
        let id = RepoId::new("octo", "demo");
        let guard = app.state.locks.acquire(&id).unwrap();

        struct Finished;
        impl Flow for Finished {
            fn name(&self) -> &'static str {
                "commit"
            }
            fn start(&mut self) -> Result<Step> {
                Ok(Step::Done(FlowOutcome::NoOp("clean".into())))
            }
            fn resume(&mut self, _answer: Answer) -> Result<Step> {
                unreachable!()
            }
            fn local_path(&self) -> Option<&Path> {
                Some(Path::new("/work/demo"))
            }
        }

        app.advance_flow(
            FlowTask {
                flow: Box::new(Finished),
                guard,
            },
            None,
        );
        pump(&mut app, |app| app.ui.status_message.is_some()).await;

        assert_eq!(app.ui.status_message.as_deref(), Some("clean"));
        assert!(!app.state.locks.is_locked(&id));
    }
}
