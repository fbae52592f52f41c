//! Modal dialogs
//!
//! Every interactive modal carries the [`ModalAction`] that receives its
//! answer, so one key handler serves flow prompts and plain confirmations.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use super::theme::Theme;
use super::widgets::{Detail, ScrollState};
use crate::error::Error;
use crate::flow::{Answer, Prompt};
use crate::session::RepoId;

/// Receiver of a modal's answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalAction {
    Login,
    /// The prompt belongs to the running flow
    Flow,
    CreateRepoName,
    CreateRepoDescription {
        name: String,
    },
    CreateRepoVisibility {
        name: String,
        description: String,
    },
    DeleteRepo(RepoId),
    SetVisibility {
        id: RepoId,
        private: bool,
    },
    CloneTo(RepoId),
    CreateBranch(RepoId),
    DeleteBranch {
        id: RepoId,
        branch: String,
    },
    SetDefaultBranch {
        id: RepoId,
        branch: String,
    },
}

#[derive(Debug)]
pub enum Modal {
    Input {
        title: String,
        message: String,
        value: String,
        masked: bool,
        action: ModalAction,
    },
    Confirm {
        title: String,
        message: String,
        action: ModalAction,
    },
    Select {
        title: String,
        message: String,
        options: Vec<String>,
        state: ListState,
        action: ModalAction,
    },
    /// Multi-line information, scrollable
    Message {
        title: String,
        body: String,
        scroll: ScrollState,
    },
    Error {
        title: String,
        message: String,
    },
    Help,
}

/// What a key press did to the modal
#[derive(Debug, PartialEq, Eq)]
pub enum ModalResult {
    Open,
    Closed,
    Answered(ModalAction, Answer),
}

impl Modal {
    pub fn input(title: impl Into<String>, message: impl Into<String>, action: ModalAction) -> Self {
        Modal::Input {
            title: title.into(),
            message: message.into(),
            value: String::new(),
            masked: false,
            action,
        }
    }

    pub fn confirm(
        title: impl Into<String>,
        message: impl Into<String>,
        action: ModalAction,
    ) -> Self {
        Modal::Confirm {
            title: title.into(),
            message: message.into(),
            action,
        }
    }

    pub fn message(title: impl Into<String>, body: impl Into<String>) -> Self {
        Modal::Message {
            title: title.into(),
            body: body.into(),
            scroll: ScrollState::new(),
        }
    }

    pub fn error(error: &Error) -> Self {
        Modal::Error {
            title: error.title().to_string(),
            message: error.to_string(),
        }
    }

    pub fn login() -> Self {
        Modal::Input {
            title: "Sign in to GitHub".to_string(),
            message: "Personal access token:".to_string(),
            value: String::new(),
            masked: true,
            action: ModalAction::Login,
        }
    }

    pub fn from_prompt(prompt: Prompt, action: ModalAction) -> Self {
        match prompt {
            Prompt::Text {
                title,
                message,
                initial,
                masked,
            } => Modal::Input {
                title,
                message,
                value: initial,
                masked,
                action,
            },
            Prompt::Confirm { title, message } => Modal::Confirm {
                title,
                message,
                action,
            },
            Prompt::Select {
                title,
                message,
                options,
                initial,
            } => {
                let mut state = ListState::default();
                state.select(initial.or(if options.is_empty() { None } else { Some(0) }));
                Modal::Select {
                    title,
                    message,
                    options,
                    state,
                    action,
                }
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ModalResult {
        match self {
            Modal::Input { value, action, .. } => match key.code {
                KeyCode::Enter => ModalResult::Answered(action.clone(), Answer::Text(value.clone())),
                KeyCode::Esc => ModalResult::Answered(action.clone(), Answer::Dismissed),
                KeyCode::Backspace => {
                    value.pop();
                    ModalResult::Open
                }
                KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    value.clear();
                    ModalResult::Open
                }
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    value.push(c);
                    ModalResult::Open
                }
                _ => ModalResult::Open,
            },

            Modal::Confirm { action, .. } => match key.code {
                KeyCode::Enter | KeyCode::Char('y' | 'Y') => {
                    ModalResult::Answered(action.clone(), Answer::Yes)
                }
                KeyCode::Char('n' | 'N') => ModalResult::Answered(action.clone(), Answer::No),
                KeyCode::Esc => ModalResult::Answered(action.clone(), Answer::Dismissed),
                _ => ModalResult::Open,
            },

            Modal::Select {
                options,
                state,
                action,
                ..
            } => match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    state.select_previous();
                    ModalResult::Open
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    let next = state.selected().map_or(0, |i| i + 1);
                    state.select(Some(next.min(options.len().saturating_sub(1))));
                    ModalResult::Open
                }
                KeyCode::Enter => {
                    let answer = state
                        .selected()
                        .and_then(|i| options.get(i))
                        .map_or(Answer::Dismissed, |o| Answer::Text(o.clone()));
                    ModalResult::Answered(action.clone(), answer)
                }
                KeyCode::Esc => ModalResult::Answered(action.clone(), Answer::Dismissed),
                _ => ModalResult::Open,
            },

            Modal::Message { scroll, .. } => match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    scroll.scroll_up(1);
                    ModalResult::Open
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    scroll.scroll_down(1);
                    ModalResult::Open
                }
                KeyCode::PageUp => {
                    scroll.page_up();
                    ModalResult::Open
                }
                KeyCode::PageDown => {
                    scroll.page_down();
                    ModalResult::Open
                }
                _ => ModalResult::Closed,
            },

            Modal::Error { .. } | Modal::Help => ModalResult::Closed,
        }
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        match self {
            Modal::Input {
                title,
                message,
                value,
                masked,
                ..
            } => {
                let inner = frame_block(frame, area, (60, 30), title, theme.modal_info);
                let shown = if *masked {
                    "•".repeat(value.chars().count())
                } else {
                    value.clone()
                };
                let text = vec![
                    Line::from(message.as_str()),
                    Line::from(""),
                    Line::from(vec![
                        Span::styled("> ", Style::default().fg(theme.text_accent)),
                        Span::raw(shown),
                        Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
                    ]),
                    Line::from(""),
                    Line::styled("[Enter] Submit  [Esc] Cancel", theme.secondary()),
                ];
                frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), inner);
            }

            Modal::Confirm { title, message, .. } => {
                let inner = frame_block(frame, area, (50, 25), title, theme.modal_warning);
                let text = vec![
                    Line::from(message.as_str()),
                    Line::from(""),
                    Line::styled("[y/Enter] Yes  [n] No  [Esc] Cancel", theme.secondary()),
                ];
                frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), inner);
            }

            Modal::Select {
                title,
                message,
                options,
                state,
                ..
            } => {
                let inner = frame_block(frame, area, (50, 50), title, theme.modal_info);
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(2), Constraint::Min(1), Constraint::Length(1)])
                    .split(inner);

                frame.render_widget(Paragraph::new(message.as_str()), chunks[0]);
                let items: Vec<ListItem<'_>> =
                    options.iter().map(|o| ListItem::new(o.as_str())).collect();
                frame.render_stateful_widget(
                    List::new(items).highlight_style(theme.selection()),
                    chunks[1],
                    state,
                );
                frame.render_widget(
                    Paragraph::new("[Enter] Choose  [Esc] Cancel").style(theme.secondary()),
                    chunks[2],
                );
            }

            Modal::Message {
                title,
                body,
                scroll,
            } => {
                let inner = frame_block(frame, area, (70, 60), title, theme.modal_info);
                scroll.set_content(body, inner.height);
                frame.render_widget(Detail::new(body.as_str()).scroll(scroll.offset), inner);
            }

            Modal::Error { title, message } => {
                let inner = frame_block(frame, area, (60, 25), title, theme.modal_error);
                let text = format!("{}\n\nPress any key to close.", message);
                frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), inner);
            }

            Modal::Help => {
                let inner = frame_block(frame, area, (70, 80), "Help", theme.modal_info);
                frame.render_widget(Paragraph::new(HELP_TEXT), inner);
            }
        }
    }
}

const HELP_TEXT: &str = "
Repositories:
  j/k, Up/Down    Move selection
  Enter           Show details
  /               Filter by name
  r               Refresh
  n               New repository
  d               Delete repository
  v               Toggle public/private
  o               Open in browser
  y               Copy clone URL
  C               Clone

Working copy:
  c               Commit
  p               Pull
  P               Push

Branches:
  b               Show branches
  Tab             Switch pane
  n / d / s       New / delete / set default (branch pane)

Other:
  PgUp/PgDn       Scroll details
  ?               Show this help
  q               Quit

Press any key to close this help.
";

/// Clear a centered area, draw a titled border and return the inside
fn frame_block(
    frame: &mut Frame,
    area: Rect,
    (percent_x, percent_y): (u16, u16),
    title: &str,
    color: ratatui::style::Color,
) -> Rect {
    let modal_area = centered_rect(percent_x, percent_y, area);
    frame.render_widget(Clear, modal_area);

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);
    inner
}

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use pretty_assertions::assert_eq;

    fn press(modal: &mut Modal, code: KeyCode) -> ModalResult {
        modal.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 100, 50);
        let centered = centered_rect(50, 50, area);

        assert!(centered.x > 0);
        assert!(centered.y > 0);
        assert!(centered.width < area.width);
        assert!(centered.height < area.height);
    }

    #[test]
    fn test_input_collects_text_and_submits() {
        let mut modal = Modal::input("New repository", "Name:", ModalAction::CreateRepoName);
        for c in "demo".chars() {
            assert_eq!(press(&mut modal, KeyCode::Char(c)), ModalResult::Open);
        }
        press(&mut modal, KeyCode::Char('x'));
        press(&mut modal, KeyCode::Backspace);

        assert_eq!(
            press(&mut modal, KeyCode::Enter),
            ModalResult::Answered(ModalAction::CreateRepoName, Answer::Text("demo".into()))
        );
    }

    #[test]
    fn test_escape_dismisses_prompts() {
        let mut modal = Modal::login();
        assert_eq!(
            press(&mut modal, KeyCode::Esc),
            ModalResult::Answered(ModalAction::Login, Answer::Dismissed)
        );

        let mut modal = Modal::from_prompt(Prompt::confirm("Push", "Push?"), ModalAction::Flow);
        assert_eq!(
            press(&mut modal, KeyCode::Esc),
            ModalResult::Answered(ModalAction::Flow, Answer::Dismissed)
        );
    }

    #[test]
    fn test_confirm_yes_and_no() {
        let id = RepoId::new("octo", "demo");
        let mut modal = Modal::confirm("Delete", "Sure?", ModalAction::DeleteRepo(id.clone()));
        assert_eq!(press(&mut modal, KeyCode::Char('x')), ModalResult::Open);
        assert_eq!(
            press(&mut modal, KeyCode::Char('n')),
            ModalResult::Answered(ModalAction::DeleteRepo(id.clone()), Answer::No)
        );
        assert_eq!(
            press(&mut modal, KeyCode::Enter),
            ModalResult::Answered(ModalAction::DeleteRepo(id), Answer::Yes)
        );
    }

    #[test]
    fn test_select_starts_at_initial_and_answers_option() {
        let prompt = Prompt::Select {
            title: "Pull".into(),
            message: "Branch:".into(),
            options: vec!["dev".into(), "main".into(), "release".into()],
            initial: Some(1),
        };
        let mut modal = Modal::from_prompt(prompt, ModalAction::Flow);

        press(&mut modal, KeyCode::Down);
        press(&mut modal, KeyCode::Down);
        assert_eq!(
            press(&mut modal, KeyCode::Enter),
            ModalResult::Answered(ModalAction::Flow, Answer::Text("release".into()))
        );
    }

    #[test]
    fn test_text_prompt_prefills_initial_value() {
        let prompt = Prompt::Text {
            title: "Local path".into(),
            message: "Where?".into(),
            initial: "/home/me/demo".into(),
            masked: false,
        };
        let mut modal = Modal::from_prompt(prompt, ModalAction::Flow);
        assert_eq!(
            press(&mut modal, KeyCode::Enter),
            ModalResult::Answered(ModalAction::Flow, Answer::Text("/home/me/demo".into()))
        );
    }

    #[test]
    fn test_error_closes_on_any_key() {
        let mut modal = Modal::error(&RemoteError::RateLimited.into());
        match &modal {
            Modal::Error { title, .. } => assert_eq!(title, "Rate limited"),
            other => panic!("unexpected modal {:?}", other),
        }
        assert_eq!(press(&mut modal, KeyCode::Char('z')), ModalResult::Closed);
    }
}
