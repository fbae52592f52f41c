//! Event handling for the TUI
//!
//! One channel carries terminal input, render ticks and results of
//! background work, so results are applied in the order they arrive.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyCode, KeyEvent, KeyModifiers};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::flow::{Flow, OperationGuard, Step};
use crate::session::{Branch, RepoId, RepositoryDetails, RepositorySummary, Session};

/// Application events
#[derive(Debug)]
pub enum AppEvent {
    Input(InputEvent),
    /// Result of background work
    StateUpdate(StateUpdate),
    Tick,
    Quit,
}

/// Input events from the terminal
#[derive(Debug, Clone)]
pub enum InputEvent {
    Key(KeyEvent),
    Mouse(crossterm::event::MouseEvent),
    Resize(u16, u16),
}

/// A flow between steps, holding the lock on its repository
pub struct FlowTask {
    pub flow: Box<dyn Flow>,
    pub guard: OperationGuard,
}

impl fmt::Debug for FlowTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowTask")
            .field("flow", &self.flow.name())
            .field("repo", self.guard.repo())
            .finish()
    }
}

/// Results posted back by background tasks
#[derive(Debug)]
pub enum StateUpdate {
    LoggedIn {
        session: Session,
    },
    LoginFailed(Error),
    /// Answer to repository list request `request`
    RepositoriesLoaded {
        request: u64,
        repositories: Vec<RepositorySummary>,
    },
    /// A write to one repository finished; the list must be re-fetched
    RepositoryChanged {
        id: RepoId,
        message: String,
    },
    DetailsLoaded {
        id: RepoId,
        details: RepositoryDetails,
    },
    BranchesLoaded {
        id: RepoId,
        request: u64,
        branches: Vec<Branch>,
    },
    /// A branch write finished; branches and the default are re-fetched
    BranchChanged {
        id: RepoId,
        message: String,
    },
    FlowProgress {
        task: FlowTask,
        result: Result<Step>,
    },
    Cloned {
        id: Option<RepoId>,
        path: PathBuf,
    },
    Failed(Error),
    Info(String),
}

/// User commands triggered by input outside of modals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    NavigateUp,
    NavigateDown,
    /// Show repository details
    Select,
    Filter,
    Refresh,
    /// New repository, or new branch in the branch pane
    New,
    /// Delete repository, or branch in the branch pane
    Delete,
    ToggleVisibility,
    Commit,
    Pull,
    Push,
    Branches,
    SetDefault,
    OpenBrowser,
    CopyUrl,
    Clone,
    SwitchPane,
    ScrollUp,
    ScrollDown,
    ShowHelp,
    Quit,
    Cancel,
}

impl UserCommand {
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        let command = match (key.code, key.modifiers) {
            (KeyCode::Up, _) | (KeyCode::Char('k'), KeyModifiers::NONE) => Self::NavigateUp,
            (KeyCode::Down, _) | (KeyCode::Char('j'), KeyModifiers::NONE) => Self::NavigateDown,
            (KeyCode::Enter, _) => Self::Select,
            (KeyCode::Tab, _) => Self::SwitchPane,

            (KeyCode::Char('/'), _) => Self::Filter,
            (KeyCode::Char('r'), KeyModifiers::NONE) => Self::Refresh,
            (KeyCode::Char('n'), KeyModifiers::NONE) => Self::New,
            (KeyCode::Char('d'), KeyModifiers::NONE) => Self::Delete,
            (KeyCode::Char('v'), KeyModifiers::NONE) => Self::ToggleVisibility,
            (KeyCode::Char('b'), KeyModifiers::NONE) => Self::Branches,
            (KeyCode::Char('s'), KeyModifiers::NONE) => Self::SetDefault,
            (KeyCode::Char('o'), KeyModifiers::NONE) => Self::OpenBrowser,
            (KeyCode::Char('y'), KeyModifiers::NONE) => Self::CopyUrl,

            (KeyCode::Char('c'), KeyModifiers::NONE) => Self::Commit,
            (KeyCode::Char('p'), KeyModifiers::NONE) => Self::Pull,
            (KeyCode::Char('P'), _) => Self::Push,
            (KeyCode::Char('C'), _) => Self::Clone,

            (KeyCode::PageUp, _) | (KeyCode::Char('u'), KeyModifiers::CONTROL) => Self::ScrollUp,
            (KeyCode::PageDown, _) | (KeyCode::Char('d'), KeyModifiers::CONTROL) => {
                Self::ScrollDown
            }

            (KeyCode::Char('?'), _) => Self::ShowHelp,
            (KeyCode::Char('q'), KeyModifiers::NONE) => Self::Quit,
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Self::Quit,
            (KeyCode::Esc, _) => Self::Cancel,

            _ => return None,
        };
        Some(command)
    }
}

/// Event loop handle
pub struct EventLoop {
    tx: mpsc::Sender<AppEvent>,
    rx: mpsc::Receiver<AppEvent>,
}

impl EventLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(256);
        Self { tx, rx }
    }

    /// Sender for background tasks
    pub fn sender(&self) -> mpsc::Sender<AppEvent> {
        self.tx.clone()
    }

    /// Spawn the terminal reader and the render ticker
    pub fn start(&mut self, tick_rate: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut reader = EventStream::new();

            loop {
                let event = match reader.next().fuse().await {
                    Some(Ok(CrosstermEvent::Key(key))) => InputEvent::Key(key),
                    Some(Ok(CrosstermEvent::Mouse(mouse))) => InputEvent::Mouse(mouse),
                    Some(Ok(CrosstermEvent::Resize(w, h))) => InputEvent::Resize(w, h),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Error reading terminal event: {}", e);
                        continue;
                    }
                    None => break,
                };

                if tx.send(AppEvent::Input(event)).await.is_err() {
                    break;
                }
            }
        });

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_rate);
            loop {
                interval.tick().await;
                if tx.send(AppEvent::Tick).await.is_err() {
                    break;
                }
            }
        });
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for draining in tests
    pub fn try_next(&mut self) -> Option<AppEvent> {
        self.rx.try_recv().ok()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Post an update from a background task; a closed channel means the app is exiting
pub async fn post(tx: &mpsc::Sender<AppEvent>, update: StateUpdate) {
    if tx.send(AppEvent::StateUpdate(update)).await.is_err() {
        debug!("Event loop closed, dropping update");
    }
}
