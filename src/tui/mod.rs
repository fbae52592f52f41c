//! Terminal UI module using ratatui
//!
//! Event-driven TUI with:
//! - Filterable repository list and repository panel
//! - Branch panel with default marker
//! - Modal overlays for sign-in, input, confirmation and selection
//! - Commit, pull and push flows driven through those modals

mod app;
mod event;
mod modal;
mod theme;
mod widgets;

pub use app::*;
pub use event::*;
pub use modal::{Modal, ModalAction, ModalResult};
pub use theme::{ColorMode, Theme};
