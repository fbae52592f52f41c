//! Pull flow: bring a remote branch into the working copy, then offer a push

use std::path::{Path, PathBuf};

use tracing::info;

use super::{
    Answer, Flow, FlowContext, FlowOutcome, Opened, Prompt, Step, branch_choices, path_answer,
};
use crate::error::{FlowError, GitError, Result};
use crate::git::{CommitOutcome, PullOutcome, PushOutcome, StageSelection, WorkingCopy};

enum State {
    Start,
    AwaitPath,
    AwaitBranch {
        working_copy: Box<dyn WorkingCopy>,
        branches: Vec<String>,
    },
    /// Dirty working copy: commit first?
    AwaitCommitChoice {
        working_copy: Box<dyn WorkingCopy>,
        branch: String,
    },
    AwaitCommitMessage {
        working_copy: Box<dyn WorkingCopy>,
        branch: String,
    },
    AwaitDiscard {
        working_copy: Box<dyn WorkingCopy>,
        branch: String,
    },
    AwaitPush {
        working_copy: Box<dyn WorkingCopy>,
        local: String,
        branch: String,
        changes_received: bool,
    },
    Finished,
}

/// Pull a remote branch, resolving local changes first
pub struct PullFlow {
    ctx: FlowContext,
    state: State,
    local_path: Option<PathBuf>,
}

impl PullFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self {
            ctx,
            state: State::Start,
            local_path: None,
        }
    }

    fn open(&mut self, path: PathBuf) -> Result<Step> {
        match self.ctx.open(&path)? {
            Opened::Ready(working_copy) => self.validated(working_copy),
            Opened::NotARepository(path) => Err(GitError::NotARepository(path).into()),
        }
    }

    fn validated(&mut self, mut working_copy: Box<dyn WorkingCopy>) -> Result<Step> {
        self.local_path = Some(working_copy.path().to_path_buf());

        working_copy.fetch_all()?;
        let branches = branch_choices(working_copy.remote_branches()?);
        if branches.is_empty() {
            return Ok(Step::Done(FlowOutcome::Invalid(
                "The working copy has no remote branches to pull".to_string(),
            )));
        }

        let current = working_copy.current_branch()?;
        let initial = current
            .as_ref()
            .and_then(|name| branches.iter().position(|b| b == name));

        let prompt = Prompt::Select {
            title: "Pull".to_string(),
            message: "Branch to pull from origin:".to_string(),
            options: branches.clone(),
            initial,
        };
        self.state = State::AwaitBranch {
            working_copy,
            branches,
        };
        Ok(Step::Ask(prompt))
    }

    fn branch_selected(
        &mut self,
        working_copy: Box<dyn WorkingCopy>,
        branches: Vec<String>,
        choice: String,
    ) -> Result<Step> {
        if !branches.contains(&choice) {
            return Ok(Step::Done(FlowOutcome::Invalid(format!(
                "'{}' is not one of the remote branches",
                choice
            ))));
        }

        if working_copy.is_dirty()? {
            self.state = State::AwaitCommitChoice {
                working_copy,
                branch: choice,
            };
            return Ok(Step::Ask(Prompt::confirm(
                "Uncommitted changes",
                "The working copy has uncommitted changes. Commit them before pulling?",
            )));
        }

        self.pull(working_copy, choice)
    }

    fn pull(&mut self, mut working_copy: Box<dyn WorkingCopy>, branch: String) -> Result<Step> {
        let remote = self
            .ctx
            .session
            .authenticated_remote(&self.ctx.repository.clone_url)?;
        working_copy.configure_origin(&remote)?;

        let changes_received = working_copy.pull(&branch)? == PullOutcome::ChangesReceived;
        info!(repo = %self.ctx.repository.id, %branch, changes_received, "Pulled");

        let local = working_copy.current_branch()?.ok_or(GitError::DetachedHead)?;
        let message = format!("Push local branch '{}' to origin/{}?", local, branch);
        self.state = State::AwaitPush {
            working_copy,
            local,
            branch,
            changes_received,
        };
        Ok(Step::Ask(Prompt::confirm("Push", message)))
    }
}

fn cancelled(reason: &str) -> Result<Step> {
    Ok(Step::Done(FlowOutcome::Cancelled(reason.to_string())))
}

impl Flow for PullFlow {
    fn name(&self) -> &'static str {
        "pull"
    }

    fn start(&mut self) -> Result<Step> {
        if !matches!(self.state, State::Start) {
            return Err(FlowError::Finished.into());
        }
        self.state = State::Finished;

        match self.ctx.local_path.clone() {
            Some(path) => self.open(path),
            None => {
                self.state = State::AwaitPath;
                Ok(Step::Ask(self.ctx.path_prompt()))
            }
        }
    }

    fn resume(&mut self, answer: Answer) -> Result<Step> {
        let state = std::mem::replace(&mut self.state, State::Finished);

        match (state, answer) {
            (State::Start | State::Finished, _) => Err(FlowError::Finished.into()),

            (State::AwaitPath, answer) => match path_answer(answer) {
                Ok(Some(path)) => self.open(path),
                Ok(None) => cancelled("No local path given"),
                Err(e) => {
                    self.state = State::AwaitPath;
                    Err(e.into())
                }
            },

            (
                State::AwaitBranch {
                    working_copy,
                    branches,
                },
                Answer::Text(choice),
            ) => self.branch_selected(working_copy, branches, choice.trim().to_string()),
            (State::AwaitBranch { .. }, Answer::Dismissed) => cancelled("Pull cancelled"),

            (
                State::AwaitCommitChoice {
                    working_copy,
                    branch,
                },
                Answer::Yes,
            ) => {
                self.state = State::AwaitCommitMessage {
                    working_copy,
                    branch,
                };
                Ok(Step::Ask(Prompt::text(
                    "Commit message",
                    "Commit message for the local changes (required):",
                )))
            }
            (
                State::AwaitCommitChoice {
                    working_copy,
                    branch,
                },
                Answer::No,
            ) => {
                self.state = State::AwaitDiscard {
                    working_copy,
                    branch,
                };
                Ok(Step::Ask(Prompt::confirm(
                    "Discard changes",
                    "Discard all uncommitted changes and pull?",
                )))
            }
            (State::AwaitCommitChoice { .. }, Answer::Dismissed) => cancelled("Pull cancelled"),

            (
                State::AwaitCommitMessage {
                    mut working_copy,
                    branch,
                },
                Answer::Text(text),
            ) => {
                let message = text.trim();
                if message.is_empty() {
                    return cancelled("A commit message is required; pull aborted");
                }
                working_copy.stage(&StageSelection::All)?;
                if let CommitOutcome::Committed(sha) = working_copy.commit(message)? {
                    info!(%sha, "Committed local changes before pull");
                }
                self.pull(working_copy, branch)
            }
            (State::AwaitCommitMessage { .. }, Answer::Dismissed) => {
                cancelled("A commit message is required; pull aborted")
            }

            (
                State::AwaitDiscard {
                    mut working_copy,
                    branch,
                },
                Answer::Yes,
            ) => {
                working_copy.hard_reset()?;
                self.pull(working_copy, branch)
            }
            (State::AwaitDiscard { .. }, Answer::No | Answer::Dismissed) => {
                cancelled("Local changes kept; pull aborted")
            }

            (
                State::AwaitPush {
                    mut working_copy,
                    local,
                    branch,
                    changes_received,
                },
                Answer::Yes,
            ) => match working_copy.push(&local, &branch)? {
                PushOutcome::Pushed => Ok(Step::Done(FlowOutcome::Pulled {
                    branch,
                    changes_received,
                    pushed: true,
                })),
                PushOutcome::Rejected(reason) => Err(GitError::Rejected(reason).into()),
            },
            (
                State::AwaitPush {
                    branch,
                    changes_received,
                    ..
                },
                Answer::No | Answer::Dismissed,
            ) => Ok(Step::Done(FlowOutcome::Pulled {
                branch,
                changes_received,
                pushed: false,
            })),

            (state, _) => {
                self.state = state;
                Err(FlowError::UnexpectedAnswer.into())
            }
        }
    }

    fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }
}
