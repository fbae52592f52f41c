//! Push flow

use std::path::{Path, PathBuf};

use tracing::info;

use super::{Answer, Flow, FlowContext, FlowOutcome, Opened, Prompt, Step, path_answer};
use crate::error::{FlowError, GitError, Result};
use crate::git::{PushOutcome, WorkingCopy};

enum State {
    Start,
    AwaitPath,
    AwaitConfirm {
        working_copy: Box<dyn WorkingCopy>,
        branch: String,
    },
    Finished,
}

/// Push the current branch to the branch of the same name on origin
pub struct PushFlow {
    ctx: FlowContext,
    state: State,
    local_path: Option<PathBuf>,
}

impl PushFlow {
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

    fn validated(&mut self, working_copy: Box<dyn WorkingCopy>) -> Result<Step> {
        self.local_path = Some(working_copy.path().to_path_buf());

        let detached = working_copy.is_head_detached()?;
        if !detached
            && !working_copy.is_dirty()?
            && working_copy.untracked_files()?.is_empty()
            && working_copy.upstream_up_to_date()?
        {
            return Ok(Step::Done(FlowOutcome::NoOp(
                "Everything up to date".to_string(),
            )));
        }

        let branch = working_copy
            .current_branch()?
            .ok_or(GitError::DetachedHead)?;

        let message = format!("Push branch '{}' to origin/{}?", branch, branch);
        self.state = State::AwaitConfirm {
            working_copy,
            branch,
        };
        Ok(Step::Ask(Prompt::confirm("Push", message)))
    }

    fn push(&mut self, mut working_copy: Box<dyn WorkingCopy>, branch: String) -> Result<Step> {
        let remote = self
            .ctx
            .session
            .authenticated_remote(&self.ctx.repository.clone_url)?;
        working_copy.configure_origin(&remote)?;

        match working_copy.push(&branch, &branch)? {
            PushOutcome::Pushed => {
                info!(repo = %self.ctx.repository.id, %branch, "Pushed");
                Ok(Step::Done(FlowOutcome::Pushed { branch }))
            }
            PushOutcome::Rejected(reason) => Err(GitError::Rejected(reason).into()),
        }
    }
}

impl Flow for PushFlow {
    fn name(&self) -> &'static str {
        "push"
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
                Ok(None) => Ok(Step::Done(FlowOutcome::Cancelled(
                    "No local path given".to_string(),
                ))),
                Err(e) => {
                    self.state = State::AwaitPath;
                    Err(e.into())
                }
            },

            (
                State::AwaitConfirm {
                    working_copy,
                    branch,
                },
                Answer::Yes,
            ) => self.push(working_copy, branch),
            (State::AwaitConfirm { .. }, Answer::No | Answer::Dismissed) => Ok(Step::Done(
                FlowOutcome::Cancelled("Push cancelled".to_string()),
            )),

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
