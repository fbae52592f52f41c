//! Commit flow: stage a selection and commit it

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{Answer, Flow, FlowContext, FlowOutcome, Opened, Prompt, Step, path_answer};
use crate::error::{FlowError, Result};
use crate::git::{CommitOutcome, StageSelection, WorkingCopy};

enum State {
    Start,
    AwaitPath,
    AwaitInit(PathBuf),
    AwaitSelection(Box<dyn WorkingCopy>),
    AwaitMessage(Box<dyn WorkingCopy>),
    Finished,
}

/// Stage local changes and commit them
pub struct CommitFlow {
    ctx: FlowContext,
    state: State,
    local_path: Option<PathBuf>,
}

impl CommitFlow {
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
            Opened::NotARepository(path) => {
                let message = format!(
                    "{} is not a git repository. Initialize one there?",
                    path.display()
                );
                self.state = State::AwaitInit(path);
                Ok(Step::Ask(Prompt::confirm("Initialize repository", message)))
            }
        }
    }

    fn validated(&mut self, working_copy: Box<dyn WorkingCopy>) -> Result<Step> {
        self.local_path = Some(working_copy.path().to_path_buf());

        if !working_copy.is_dirty()? && working_copy.untracked_files()?.is_empty() {
            debug!("Working tree clean");
            return Ok(Step::Done(FlowOutcome::NoOp(
                "Nothing to commit, working tree clean".to_string(),
            )));
        }

        let status = working_copy.status_text()?;
        self.state = State::AwaitSelection(working_copy);
        Ok(Step::Ask(Prompt::text(
            "Commit",
            format!(
                "{}\n\nFiles to stage, comma-separated (leave blank to stage everything):",
                status
            ),
        )))
    }

    fn commit(&mut self, mut working_copy: Box<dyn WorkingCopy>, text: &str) -> Result<Step> {
        let message = match text.trim() {
            "" => self.ctx.default_commit_message.clone(),
            message => message.to_string(),
        };

        match working_copy.commit(&message)? {
            CommitOutcome::Committed(sha) => {
                info!(repo = %self.ctx.repository.id, %sha, "Committed");
                Ok(Step::Done(FlowOutcome::Committed { sha, message }))
            }
            CommitOutcome::NothingToCommit => Ok(Step::Done(FlowOutcome::NoOp(
                "Nothing was staged; no commit made".to_string(),
            ))),
        }
    }
}

fn cancelled(reason: &str) -> Result<Step> {
    Ok(Step::Done(FlowOutcome::Cancelled(reason.to_string())))
}

impl Flow for CommitFlow {
    fn name(&self) -> &'static str {
        "commit"
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
        // Errors leave the flow finished
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

            (State::AwaitInit(path), Answer::Yes) => {
                let working_copy = self.ctx.opener.init(&path)?;
                self.validated(working_copy)
            }
            (State::AwaitInit(_), Answer::No | Answer::Dismissed) => {
                cancelled("Repository not initialized")
            }

            (State::AwaitSelection(mut working_copy), Answer::Text(text)) => {
                working_copy.stage(&StageSelection::parse(&text))?;
                self.state = State::AwaitMessage(working_copy);
                Ok(Step::Ask(Prompt::text(
                    "Commit message",
                    format!(
                        "Commit message (leave blank for \"{}\"):",
                        self.ctx.default_commit_message
                    ),
                )))
            }
            (State::AwaitSelection(_), Answer::Dismissed) => cancelled("Commit cancelled"),

            (State::AwaitMessage(working_copy), Answer::Text(text)) => {
                self.commit(working_copy, &text)
            }
            (State::AwaitMessage(_), Answer::Dismissed) => cancelled("Commit cancelled"),

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
