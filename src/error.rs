//! Application error types.
//!
//! Defines `AppError` for every failure the tracker can surface and the
//! classification of raw libgit2 errors raised during clone and fetch.
//!
//! Error kinds:
//! - `RepoNotFound` → remote missing or unreachable during clone
//! - `AuthFailed` → credentials rejected
//! - `InvalidReference` → a ref that resolves to neither a tag nor a commit
//! - `FetchFailed` → any other failure while refreshing
//! - `Filesystem` → disk/permission problems around the clone directory,
//!   including libgit2 failures writing objects, refs or the index
//! - `LocationMismatch` → a clone on disk belongs to a different remote

use std::fmt;
use std::io;

use git2::{ErrorClass, ErrorCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid location: {0}")]
    Parse(String),

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Clone belongs to another remote: {0}")]
    LocationMismatch(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// The typed git failures callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitErrorKind {
    NotFound,
    AuthFailed,
    InvalidReference,
    FetchFailed,
}

impl fmt::Display for GitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GitErrorKind::NotFound => "not found",
            GitErrorKind::AuthFailed => "authentication failed",
            GitErrorKind::InvalidReference => "invalid reference",
            GitErrorKind::FetchFailed => "fetch failed",
        };
        f.write_str(label)
    }
}

impl AppError {
    pub fn kind(&self) -> Option<GitErrorKind> {
        match self {
            AppError::RepoNotFound(_) => Some(GitErrorKind::NotFound),
            AppError::AuthFailed(_) => Some(GitErrorKind::AuthFailed),
            AppError::InvalidReference(_) => Some(GitErrorKind::InvalidReference),
            AppError::FetchFailed(_) => Some(GitErrorKind::FetchFailed),
            _ => None,
        }
    }

    /// Classify a libgit2 failure raised while cloning `location`.
    pub fn from_clone(err: git2::Error, location: &str) -> Self {
        match err.code() {
            ErrorCode::Auth | ErrorCode::Certificate => {
                AppError::AuthFailed(format!("{}: {}", location, err.message()))
            }
            ErrorCode::User => AppError::Cancelled(format!("clone of {}", location)),
            _ if is_local_io(&err) => local_io(err, location),
            _ => AppError::RepoNotFound(format!("{}: {}", location, err.message())),
        }
    }

    /// Classify a libgit2 failure raised while fetching `remote`.
    pub fn from_fetch(err: git2::Error, remote: &str) -> Self {
        match err.code() {
            ErrorCode::Auth | ErrorCode::Certificate => {
                AppError::AuthFailed(format!("{}: {}", remote, err.message()))
            }
            ErrorCode::User => AppError::Cancelled(format!("fetch of {}", remote)),
            _ if is_local_io(&err) => local_io(err, remote),
            _ => AppError::FetchFailed(format!("{}: {}", remote, err.message())),
        }
    }
}

/// libgit2 reports socket and TLS syscall failures with the OS class too.
const NETWORK_OS_ERRORS: &[&str] = &["failed to connect", "SSL error", "could not initialize Windows Socket"];

/// Failure on the local side: disk, permissions, object database or index.
fn is_local_io(err: &git2::Error) -> bool {
    match err.class() {
        ErrorClass::Filesystem | ErrorClass::Odb | ErrorClass::Index => true,
        ErrorClass::Os => !NETWORK_OS_ERRORS.iter().any(|prefix| err.message().starts_with(prefix)),
        _ => false,
    }
}

fn local_io(err: git2::Error, target: &str) -> AppError {
    AppError::Filesystem(io::Error::other(format!("{}: {}", target, err.message())))
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_classify_as_auth_failed() {
        let err = git2::Error::new(ErrorCode::Auth, ErrorClass::Ssh, "rejected");
        let app = AppError::from_clone(err, "git@host:me/repo");
        assert_eq!(app.kind(), Some(GitErrorKind::AuthFailed));
    }

    #[test]
    fn unreachable_clone_is_not_found() {
        let err = git2::Error::new(ErrorCode::GenericError, ErrorClass::Net, "no route");
        let app = AppError::from_clone(err, "https://nowhere/x.git");
        assert_eq!(app.kind(), Some(GitErrorKind::NotFound));
        assert!(app.to_string().contains("no route"));
    }

    #[test]
    fn fetch_failure_keeps_reason() {
        let err = git2::Error::new(ErrorCode::GenericError, ErrorClass::Net, "reset by peer");
        let app = AppError::from_fetch(err, "origin");
        assert_eq!(app.kind(), Some(GitErrorKind::FetchFailed));
        assert!(app.to_string().contains("reset by peer"));
    }

    #[test]
    fn disk_failures_are_filesystem_errors() {
        let err = git2::Error::new(ErrorCode::GenericError, ErrorClass::Os, "No space left on device");
        assert!(matches!(AppError::from_clone(err, "git@host:me/repo"), AppError::Filesystem(_)));

        let err = git2::Error::new(ErrorCode::GenericError, ErrorClass::Odb, "failed to write object");
        let app = AppError::from_fetch(err, "origin");
        assert!(matches!(app, AppError::Filesystem(_)));
        assert!(app.to_string().contains("failed to write object"));

        for class in [ErrorClass::Filesystem, ErrorClass::Index] {
            let err = git2::Error::new(ErrorCode::GenericError, class, "permission denied");
            assert!(matches!(AppError::from_fetch(err, "origin"), AppError::Filesystem(_)));
        }
    }

    #[test]
    fn socket_failures_stay_remote_errors() {
        let err = git2::Error::new(ErrorCode::GenericError, ErrorClass::Os, "failed to connect to example.com");
        assert_eq!(AppError::from_clone(err, "https://example.com/x.git").kind(), Some(GitErrorKind::NotFound));

        let err = git2::Error::new(ErrorCode::GenericError, ErrorClass::Os, "SSL error: syscall failure");
        assert_eq!(AppError::from_fetch(err, "origin").kind(), Some(GitErrorKind::FetchFailed));
    }

    #[test]
    fn aborted_callbacks_are_cancellations() {
        let err = git2::Error::new(ErrorCode::User, ErrorClass::Callback, "stop");
        assert!(matches!(AppError::from_fetch(err, "origin"), AppError::Cancelled(_)));
    }
}
