//! What a flow asks for and how it ends

use std::fmt;

/// A question the presentation layer must put to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Free text; answered with [`Answer::Text`]
    Text {
        title: String,
        message: String,
        initial: String,
        masked: bool,
    },
    /// Yes/no; answered with [`Answer::Yes`] or [`Answer::No`]
    Confirm { title: String, message: String },
    /// One of `options`; answered with [`Answer::Text`] holding the choice
    Select {
        title: String,
        message: String,
        options: Vec<String>,
        initial: Option<usize>,
    },
}

impl Prompt {
    pub fn text(title: impl Into<String>, message: impl Into<String>) -> Self {
        Prompt::Text {
            title: title.into(),
            message: message.into(),
            initial: String::new(),
            masked: false,
        }
    }

    pub fn confirm(title: impl Into<String>, message: impl Into<String>) -> Self {
        Prompt::Confirm {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Prompt::Text { title, .. } | Prompt::Confirm { title, .. } | Prompt::Select { title, .. } => {
                title
            }
        }
    }
}

/// The user's reply to a [`Prompt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Yes,
    No,
    /// The prompt was closed without answering (Esc); distinct from empty text
    Dismissed,
}

/// Result of advancing a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Ask(Prompt),
    Done(FlowOutcome),
}

/// How a flow ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Committed {
        sha: String,
        message: String,
    },
    /// Nothing needed doing
    NoOp(String),
    /// The user declined or dismissed a prompt
    Cancelled(String),
    /// The user's input was rejected before anything was changed
    Invalid(String),
    Pulled {
        branch: String,
        changes_received: bool,
        pushed: bool,
    },
    Pushed {
        branch: String,
    },
}

impl FlowOutcome {
    /// Whether the working copy or remote was changed
    pub fn changed_something(&self) -> bool {
        matches!(
            self,
            FlowOutcome::Committed { .. } | FlowOutcome::Pulled { .. } | FlowOutcome::Pushed { .. }
        )
    }
}

impl fmt::Display for FlowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowOutcome::Committed { sha, message } => {
                let short = sha.get(..7).unwrap_or(sha);
                write!(f, "Committed {}: {}", short, message)
            }
            FlowOutcome::NoOp(reason) | FlowOutcome::Cancelled(reason) => f.write_str(reason),
            FlowOutcome::Invalid(reason) => write!(f, "Invalid: {}", reason),
            FlowOutcome::Pulled {
                branch,
                changes_received,
                pushed,
            } => {
                if *changes_received {
                    write!(f, "Pulled changes from origin/{}", branch)?;
                } else {
                    write!(f, "origin/{} already up to date", branch)?;
                }
                if *pushed {
                    f.write_str("; pushed local commits")?;
                }
                Ok(())
            }
            FlowOutcome::Pushed { branch } => write!(f, "Pushed {} to origin", branch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        let outcome = FlowOutcome::Committed {
            sha: "0123456789abcdef".into(),
            message: "wip".into(),
        };
        assert_eq!(outcome.to_string(), "Committed 0123456: wip");
        assert!(outcome.changed_something());

        let outcome = FlowOutcome::Pulled {
            branch: "main".into(),
            changes_received: false,
            pushed: true,
        };
        assert_eq!(
            outcome.to_string(),
            "origin/main already up to date; pushed local commits"
        );

        assert!(!FlowOutcome::NoOp("clean".into()).changed_something());
    }
}
