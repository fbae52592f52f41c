//! GitHub remote access
//!
//! [`RepositoryHost`] is the seam the UI and the flows talk to;
//! [`GitHubClient`] is the REST implementation.

mod client;
mod validate;

pub use client::*;
pub use validate::*;
