//! Client-side name checks
//!
//! Catch obviously bad names before a request is made. The remote still has
//! the final word; these only reject what it would certainly reject.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::RemoteError;

static REPO_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]{1,100}$").expect("static regex")
});

/// Characters git refuses in ref names
const FORBIDDEN_REF_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

/// Check a repository name
pub fn validate_repo_name(name: &str) -> Result<(), RemoteError> {
    if name == "." || name == ".." || !REPO_NAME.is_match(name) {
        return Err(RemoteError::Validation(format!(
            "'{}' is not a valid repository name (letters, digits, '.', '-' and '_' only)",
            name
        )));
    }
    Ok(())
}

/// Check a branch name
pub fn validate_branch_name(name: &str) -> Result<(), RemoteError> {
    let reason = if name.is_empty() {
        Some("branch name cannot be empty")
    } else if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("branch name cannot contain whitespace")
    } else if name.contains("..") || name.contains("@{") || name.contains("//") {
        Some("branch name cannot contain '..', '@{' or '//'")
    } else if name.contains(FORBIDDEN_REF_CHARS) {
        Some("branch name cannot contain any of ~ ^ : ? * [ \\")
    } else if name.starts_with('/') || name.ends_with('/') || name.starts_with('-') {
        Some("branch name cannot start with '/' or '-', or end with '/'")
    } else if name.ends_with(".lock") || name.ends_with('.') {
        Some("branch name cannot end with '.lock' or '.'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(RemoteError::Validation(format!("'{}': {}", name, reason))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_repo_names() {
        for name in ["demo", "my-repo", "my_repo.rs", "A1", ".github"] {
            assert!(validate_repo_name(name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_invalid_repo_names() {
        for name in ["", ".", "..", "has space", "slash/name", "emoji🙂"] {
            assert!(validate_repo_name(name).is_err(), "{}", name);
        }
    }

    #[test]
    fn test_valid_branch_names() {
        for name in ["main", "feature/login", "release-1.2", "fix_123"] {
            assert!(validate_branch_name(name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_invalid_branch_names() {
        for name in [
            "", "has space", "a..b", "a~1", "x^", "c:d", "q?", "s*", "[x", "back\\slash",
            "/lead", "trail/", "-dash", "x.lock", "dot.", "a//b", "a@{b",
        ] {
            assert!(validate_branch_name(name).is_err(), "{}", name);
        }
    }
}
