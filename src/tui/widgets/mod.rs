//! TUI widgets
//!
//! - `RepoList` / `BranchList` - selectable lists with domain markers
//! - `Detail` - scrollable text panel

mod detail;
mod repo_list;

pub use detail::*;
pub use repo_list::*;
