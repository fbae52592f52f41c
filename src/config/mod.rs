//! Configuration and application state
//!
//! Handles:
//! - User configuration (`config.toml` in the platform config directory, `HC_*` env overrides)
//! - In-memory application state (session, repository cache, selection)

mod settings;
mod state;

pub use settings::*;
pub use state::*;
