//! Core domain types
//!
//! Mirrors the shape of the GitHub repository and branch JSON that the
//! client reads. All of these are read-only snapshots: the remote is the
//! source of truth and callers re-fetch after every write.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository identifier in `owner/name` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    /// Build from owner and repository name
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse an `owner/name` string
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("expected 'owner/name', got '{}'", s))
    }
}

impl TryFrom<String> for RepoId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.full_name()
    }
}

/// A repository as listed by the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    /// `owner/name`
    #[serde(rename = "full_name")]
    pub id: RepoId,
    pub name: String,
    /// API URL of the repository resource
    pub url: String,
    pub clone_url: String,
    pub html_url: String,
    pub private: bool,
    #[serde(default)]
    pub default_branch: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl RepositorySummary {
    /// Visibility label
    pub fn visibility(&self) -> &'static str {
        if self.private { "private" } else { "public" }
    }
}

/// Extended repository information for the details view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDetails {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub language: Option<String>,
    pub private: bool,
    #[serde(default)]
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RepositoryDetails {
    /// Multi-line text for display
    pub fn to_text(&self) -> String {
        format!(
            "Name: {}\nDescription: {}\nStars: {}\nForks: {}\nLanguage: {}\nVisibility: {}\nDefault branch: {}\nCreated: {}\nUpdated: {}",
            self.name,
            self.description.as_deref().unwrap_or("-"),
            self.stargazers_count,
            self.forks_count,
            self.language.as_deref().unwrap_or("-"),
            if self.private { "private" } else { "public" },
            self.default_branch,
            self.created_at.format("%Y-%m-%d %H:%M UTC"),
            self.updated_at.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}

/// A remote branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub is_default: bool,
}

/// Profile of the authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Name to greet the user with
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.login,
        }
    }
}

/// Repositories whose name contains `query`, ignoring case, in input order
pub fn filter_repositories<'a>(
    repos: &'a [RepositorySummary],
    query: &str,
) -> Vec<&'a RepositorySummary> {
    let needle = query.to_lowercase();
    repos
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&needle))
        .collect()
}
