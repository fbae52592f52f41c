//! GitHub REST client
//!
//! Thin wrapper over `reqwest`: every call is one (or, for paginated lists,
//! a few) authenticated requests whose status code decides the outcome.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, instrument};
use url::Url;

use super::validate::{validate_branch_name, validate_repo_name};
use crate::config::Config;
use crate::error::RemoteError;
use crate::session::{Branch, RepoId, RepositoryDetails, RepositorySummary, SecretToken, UserProfile};

/// Result of a remote call
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Remote repository operations
///
/// Every method is independent: none relies on the success of an earlier
/// call, and results are snapshots the caller must re-fetch after a write.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Profile of the token's owner; doubles as token verification
    async fn current_user(&self) -> RemoteResult<UserProfile>;

    /// All repositories visible to the authenticated user
    async fn list_repos(&self) -> RemoteResult<Vec<RepositorySummary>>;

    async fn repo_details(&self, id: &RepoId) -> RemoteResult<RepositoryDetails>;

    async fn create_repo(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> RemoteResult<RepositorySummary>;

    async fn delete_repo(&self, id: &RepoId) -> RemoteResult<()>;

    async fn set_visibility(&self, id: &RepoId, private: bool) -> RemoteResult<RepositorySummary>;

    /// All branches, with the current default flagged
    async fn list_branches(&self, id: &RepoId) -> RemoteResult<Vec<Branch>>;

    async fn delete_branch(&self, id: &RepoId, name: &str) -> RemoteResult<()>;

    /// Current default branch, read fresh from the remote
    async fn default_branch(&self, id: &RepoId) -> RemoteResult<String>;

    /// Returns the default branch reported back by the remote
    async fn set_default_branch(&self, id: &RepoId, name: &str) -> RemoteResult<String>;

    /// Create `name` at the head of the current default branch
    async fn create_branch(&self, id: &RepoId, name: &str) -> RemoteResult<Branch>;
}

/// GitHub API client
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: Url,
    token: SecretToken,
    page_size: u8,
}

#[derive(Deserialize)]
struct BranchEntry {
    name: String,
}

#[derive(Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Deserialize)]
struct DefaultBranchOnly {
    default_branch: String,
}

impl GitHubClient {
    /// Create a client for the configured API endpoint
    pub fn new(config: &Config, token: SecretToken) -> RemoteResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| RemoteError::Transport(format!("invalid API URL: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            token,
            page_size: config.page_size,
        })
    }

    /// Build an endpoint URL from raw path segments; each is percent-encoded
    fn endpoint(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Transport("API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_endpoint(&self, id: &RepoId, rest: &[&str]) -> RemoteResult<Url> {
        let mut segments = vec!["repos", id.owner(), id.name()];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    /// Send with credentials and turn non-success statuses into errors
    async fn send(&self, request: RequestBuilder, resource: &str) -> RemoteResult<Response> {
        let response = request.bearer_auth(self.token.expose()).send().await?;
        let status = response.status();
        debug!(%status, resource, "GitHub API response");

        if status.is_success() {
            return Ok(response);
        }

        let rate_limited = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0");
        let body = response.text().await.unwrap_or_default();

        Err(classify_status(status.as_u16(), rate_limited, &body, resource))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, resource: &str) -> RemoteResult<T> {
        let response = self.send(self.http.get(url), resource).await?;
        Ok(response.json().await?)
    }

    /// Follow `page=` until a short page comes back
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        url: Url,
        resource: &str,
    ) -> RemoteResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("per_page", &self.page_size.to_string())
                .append_pair("page", &page.to_string());

            let batch: Vec<T> = self.get_json(page_url, resource).await?;
            let done = batch.len() < self.page_size as usize;
            items.extend(batch);

            if done {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    #[instrument(skip_all)]
    async fn current_user(&self) -> RemoteResult<UserProfile> {
        let url = self.endpoint(&["user"])?;
        let user: UserProfile = self.get_json(url, "user").await?;
        info!(login = %user.login, "Authenticated");
        Ok(user)
    }

    #[instrument(skip_all)]
    async fn list_repos(&self) -> RemoteResult<Vec<RepositorySummary>> {
        let url = self.endpoint(&["user", "repos"])?;
        let repos: Vec<RepositorySummary> = self.get_paginated(url, "repositories").await?;
        debug!(count = repos.len(), "Listed repositories");
        Ok(repos)
    }

    #[instrument(skip_all, fields(repo = %id))]
    async fn repo_details(&self, id: &RepoId) -> RemoteResult<RepositoryDetails> {
        let url = self.repo_endpoint(id, &[])?;
        self.get_json(url, &id.full_name()).await
    }

    #[instrument(skip(self, description))]
    async fn create_repo(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> RemoteResult<RepositorySummary> {
        validate_repo_name(name)?;

        let url = self.endpoint(&["user", "repos"])?;
        let body = json!({
            "name": name,
            "description": description,
            "private": private,
        });
        let response = self.send(self.http.post(url).json(&body), name).await?;
        let repo: RepositorySummary = response.json().await?;
        info!(repo = %repo.id, "Created repository");
        Ok(repo)
    }

    #[instrument(skip_all, fields(repo = %id))]
    async fn delete_repo(&self, id: &RepoId) -> RemoteResult<()> {
        let url = self.repo_endpoint(id, &[])?;
        self.send(self.http.delete(url), &id.full_name()).await?;
        info!("Deleted repository");
        Ok(())
    }

    #[instrument(skip_all, fields(repo = %id, private = private))]
    async fn set_visibility(&self, id: &RepoId, private: bool) -> RemoteResult<RepositorySummary> {
        let url = self.repo_endpoint(id, &[])?;
        let body = json!({ "private": private });
        let response = self
            .send(self.http.patch(url).json(&body), &id.full_name())
            .await?;
        Ok(response.json().await?)
    }

    #[instrument(skip_all, fields(repo = %id))]
    async fn list_branches(&self, id: &RepoId) -> RemoteResult<Vec<Branch>> {
        let default = self.default_branch(id).await?;
        let url = self.repo_endpoint(id, &["branches"])?;
        let entries: Vec<BranchEntry> = self.get_paginated(url, &id.full_name()).await?;

        Ok(entries
            .into_iter()
            .map(|b| Branch {
                is_default: b.name == default,
                name: b.name,
            })
            .collect())
    }

    #[instrument(skip_all, fields(repo = %id, branch = name))]
    async fn delete_branch(&self, id: &RepoId, name: &str) -> RemoteResult<()> {
        validate_branch_name(name)?;

        let mut rest = vec!["git", "refs", "heads"];
        rest.extend(name.split('/'));
        let url = self.repo_endpoint(id, &rest)?;
        self.send(self.http.delete(url), name).await?;
        info!("Deleted branch");
        Ok(())
    }

    #[instrument(skip_all, fields(repo = %id))]
    async fn default_branch(&self, id: &RepoId) -> RemoteResult<String> {
        let url = self.repo_endpoint(id, &[])?;
        let repo: DefaultBranchOnly = self.get_json(url, &id.full_name()).await?;
        Ok(repo.default_branch)
    }

    #[instrument(skip_all, fields(repo = %id, branch = name))]
    async fn set_default_branch(&self, id: &RepoId, name: &str) -> RemoteResult<String> {
        validate_branch_name(name)?;

        let url = self.repo_endpoint(id, &[])?;
        let body = json!({ "default_branch": name });
        let response = self
            .send(self.http.patch(url).json(&body), &id.full_name())
            .await?;
        let repo: DefaultBranchOnly = response.json().await?;
        info!(default_branch = %repo.default_branch, "Default branch updated");
        Ok(repo.default_branch)
    }

    #[instrument(skip_all, fields(repo = %id, branch = name))]
    async fn create_branch(&self, id: &RepoId, name: &str) -> RemoteResult<Branch> {
        validate_branch_name(name)?;

        // Resolve the source commit here rather than trusting caller state
        let default = self.default_branch(id).await?;
        let mut rest = vec!["git", "ref", "heads"];
        rest.extend(default.split('/'));
        let url = self.repo_endpoint(id, &rest)?;
        let head: GitRef = self.get_json(url, &default).await?;

        let url = self.repo_endpoint(id, &["git", "refs"])?;
        let body = json!({
            "ref": format!("refs/heads/{}", name),
            "sha": head.object.sha,
        });
        self.send(self.http.post(url).json(&body), name).await?;
        info!(from = %default, "Created branch");

        Ok(Branch {
            name: name.to_string(),
            is_default: false,
        })
    }
}

/// Map a non-success status onto the error taxonomy
pub fn classify_status(status: u16, rate_limited: bool, body: &str, resource: &str) -> RemoteError {
    let message = error_message(body).unwrap_or_else(|| resource.to_string());

    match status {
        401 => RemoteError::Authentication,
        403 | 429 if rate_limited || status == 429 => RemoteError::RateLimited,
        403 => RemoteError::PermissionDenied(message),
        404 => RemoteError::NotFound(resource.to_string()),
        409 => RemoteError::Conflict(message),
        400 | 422 => RemoteError::Validation(message),
        _ => RemoteError::Unexpected { status, message },
    }
}

/// Extract GitHub's `message` (and first detailed error) from an error body
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = value.get("message")?.as_str()?.to_string();

    let detail = value
        .get("errors")
        .and_then(|e| e.as_array())
        .and_then(|errors| errors.first())
        .and_then(|first| first.get("message").and_then(|m| m.as_str()));

    Some(match detail {
        Some(detail) => format!("{} ({})", message, detail),
        None => message,
    })
}
