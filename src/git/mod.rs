//! Local working-copy operations
//!
//! - [`WorkingCopy`] / [`WorkingCopyOpener`] - what the flows depend on
//! - [`Git2Opener`] - libgit2-backed implementation

mod backend;
mod working_copy;

pub use backend::*;
pub use working_copy::*;
