//! Error types for hub-commander
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `Display` and `Error` impls.
//! Every error can be mapped onto an [`ErrorKind`] so the presentation layer can
//! tell an authentication problem from a rejected push without string matching.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for hub-commander
#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("{0}")]
    Flow(#[from] FlowError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TUI error: {0}")]
    Tui(#[from] TuiError),
}

/// Failure classes surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or expired token
    AuthenticationFailure,
    NotFound,
    /// Rejected input (bad repository or branch name)
    ValidationFailure,
    /// Authenticated but not allowed (push/pull auth, missing scope)
    PermissionDenied,
    /// Rejected push, missing remote ref, merge conflicts
    Conflict,
    RateLimited,
    /// The local directory is not a usable working copy
    LocalStateError,
    /// Another operation is already running for the same repository
    Busy,
    Unknown,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Remote(e) => e.kind(),
            Error::Git(e) => e.kind(),
            Error::Flow(e) => e.kind(),
            Error::Config(_) | Error::Io(_) | Error::Tui(_) => ErrorKind::Unknown,
        }
    }

    /// Short heading for error dialogs
    pub fn title(&self) -> &'static str {
        match self.kind() {
            ErrorKind::AuthenticationFailure => "Authentication failed",
            ErrorKind::NotFound => "Not found",
            ErrorKind::ValidationFailure => "Invalid input",
            ErrorKind::PermissionDenied => "Permission denied",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::RateLimited => "Rate limited",
            ErrorKind::LocalStateError => "Local repository error",
            ErrorKind::Busy => "Busy",
            ErrorKind::Unknown => "Error",
        }
    }
}

/// GitHub API errors, classified from HTTP status codes
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("authentication failed (invalid or expired token)")]
    Authentication,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("API rate limit exceeded")]
    RateLimited,

    #[error("unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("failed to parse response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Authentication => ErrorKind::AuthenticationFailure,
            RemoteError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            RemoteError::NotFound(_) => ErrorKind::NotFound,
            RemoteError::Validation(_) => ErrorKind::ValidationFailure,
            RemoteError::Conflict(_) => ErrorKind::Conflict,
            RemoteError::RateLimited => ErrorKind::RateLimited,
            RemoteError::Unexpected { .. } | RemoteError::Transport(_) | RemoteError::Decode(_) => {
                ErrorKind::Unknown
            }
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            // reqwest includes the URL but never the Authorization header
            RemoteError::Transport(e.to_string())
        }
    }
}

/// Git operations errors
///
/// Messages are redacted of credentials before these are constructed.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("HEAD is detached; check out a branch first")]
    DetachedHead,

    #[error("Remote '{0}' is not configured")]
    NoRemote(String),

    #[error("Remote branch '{0}' not found")]
    RemoteRefNotFound(String),

    #[error("Remote authentication failed: {0}")]
    Authentication(String),

    #[error("Merge produced conflicts in {0} file(s); resolve them and commit")]
    Conflict(usize),

    #[error("Push rejected: {0}")]
    Rejected(String),

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("Git operation failed: {0}")]
    OperationFailed(String),
}

impl GitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GitError::NotARepository(_) | GitError::DetachedHead | GitError::NoRemote(_) => {
                ErrorKind::LocalStateError
            }
            GitError::RemoteRefNotFound(_) | GitError::Conflict(_) | GitError::Rejected(_) => {
                ErrorKind::Conflict
            }
            GitError::Authentication(_) => ErrorKind::PermissionDenied,
            GitError::InvalidUrl(_) => ErrorKind::ValidationFailure,
            GitError::OperationFailed(_) => ErrorKind::Unknown,
        }
    }
}

/// Orchestration errors
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("An operation is already running for {0}")]
    Busy(String),

    #[error("The flow has already finished")]
    Finished,

    #[error("Unexpected answer for the current prompt")]
    UnexpectedAnswer,
}

impl FlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Busy(_) => ErrorKind::Busy,
            FlowError::Finished | FlowError::UnexpectedAnswer => ErrorKind::Unknown,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to create config directory: {0}")]
    DirectoryCreationFailed(PathBuf),
}

/// TUI-related errors
#[derive(Error, Debug)]
pub enum TuiError {
    #[error("Failed to initialize terminal: {0}")]
    InitFailed(String),

    #[error("Failed to restore terminal: {0}")]
    RestoreFailed(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("{0}")]
    Platform(String),
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RemoteError::Authentication;
        assert!(err.to_string().contains("authentication failed"));

        let err = GitError::NotARepository(PathBuf::from("/tmp/foo"));
        assert!(err.to_string().contains("/tmp/foo"));

        let err = FlowError::Busy("octo/demo".to_string());
        assert!(err.to_string().contains("octo/demo"));
    }

    #[test]
    fn test_error_conversion() {
        let remote_err = RemoteError::RateLimited;
        let top: Error = remote_err.into();
        assert_eq!(top.kind(), ErrorKind::RateLimited);

        let git_err = GitError::DetachedHead;
        let top: Error = git_err.into();
        assert_eq!(top.kind(), ErrorKind::LocalStateError);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::from(GitError::Rejected("non-fast-forward".into())).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            Error::from(GitError::RemoteRefNotFound("dev".into())).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            Error::from(GitError::Authentication("denied".into())).kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            Error::from(RemoteError::Validation("name already exists".into())).kind(),
            ErrorKind::ValidationFailure
        );
        assert_eq!(Error::from(FlowError::Busy("a/b".into())).title(), "Busy");
    }
}
