//! Session and domain model
//!
//! - `Session` - verified token plus the authenticated user's profile
//! - `RepositorySummary` / `Branch` - snapshots of remote state
//! - `AuthenticatedRemote` - credentialed remote URL, built at the point of use

mod credentials;
mod types;

pub use credentials::*;
pub use types::*;

#[cfg(test)]
pub(crate) fn sample_repo(owner: &str, name: &str) -> RepositorySummary {
    RepositorySummary {
        id: RepoId::new(owner, name),
        name: name.to_string(),
        url: format!("https://api.github.com/repos/{}/{}", owner, name),
        clone_url: format!("https://github.com/{}/{}.git", owner, name),
        html_url: format!("https://github.com/{}/{}", owner, name),
        private: false,
        default_branch: "main".to_string(),
        description: None,
    }
}
