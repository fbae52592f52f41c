//! hub-commander - a terminal client for managing GitHub repositories
//!
//! Lists, creates, deletes and re-publishes repositories through the GitHub
//! REST API, manages their branches, and commits, pulls and pushes local
//! working copies with libgit2.
//!
//! # Modules
//!
//! - [`github`] - Remote repository client over the REST API
//! - [`git`] - Local working-copy adapter
//! - [`flow`] - Commit, pull and push as explicit state machines
//! - [`session`] - Credentials and the domain model
//! - [`tui`] - Event-driven terminal UI with ratatui
//! - [`config`] - Configuration and in-memory application state
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod flow;
pub mod git;
pub mod github;
pub mod session;
pub mod tui;

pub use config::{AppState, Config};
pub use error::{Error, ErrorKind, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
