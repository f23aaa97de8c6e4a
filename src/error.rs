//! # Errors
//!
//! Error taxonomy for the sync and versioning engine.
//!
//! - [`StoreError`] is returned by remote and version store adapters.
//! - [`ConfigError`] is raised while loading `envzip.config`, before any sync runs.
//! - [`SyncError`] is the crate-level error surfaced to callers.
//!
//! Conflicts are not errors: they are reported in a `MergeResult`. Malformed
//! env file lines never raise either; the codec ignores them.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a `RemoteStore` or `VersionStore` implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store rejected the request: {0}")]
    Rejected(String),

    #[error("failed to encode or decode remote document: {0}")]
    Encoding(String),
}

impl StoreError {
    pub fn entry_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "entry",
            id: id.into(),
        }
    }

    pub fn version_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "version",
            id: id.into(),
        }
    }

    /// True when retrying the same request later may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Encoding(e.to_string())
        } else {
            Self::Unavailable(e.to_string())
        }
    }
}

/// Errors raised while loading or validating the sync configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{} not found. Run \"envzip init\" first.", .0.display())]
    NotFound(PathBuf),

    #[error("missing required field \"{0}\" in envzip.config")]
    MissingField(&'static str),

    #[error("invalid stage \"{0}\" (expected development, staging or production)")]
    InvalidStage(String),

    #[error("invalid value for \"{field}\": {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-level error type
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("remote store rejected the request: {0}")]
    Rejected(String),

    #[error("failed to record version history: {0}")]
    VersionRecord(String),

    #[error("failed to access local env file {}: {source}", path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist sync baseline: {0}")]
    Baseline(String),

    #[error("file watcher error: {0}")]
    Watcher(String),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            StoreError::Unavailable(msg) => Self::RemoteUnavailable(msg),
            StoreError::Rejected(msg) => Self::Rejected(msg),
            StoreError::Encoding(msg) => Self::RemoteUnavailable(format!("bad response: {msg}")),
        }
    }
}

impl From<notify::Error> for SyncError {
    fn from(e: notify::Error) -> Self {
        Self::Watcher(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_sync_not_found() {
        let err: SyncError = StoreError::version_not_found("v-1").into();
        assert!(matches!(err, SyncError::NotFound { kind: "version", .. }));
        assert_eq!(err.to_string(), "version 'v-1' not found");
    }

    #[test]
    fn test_unavailable_is_transient() {
        assert!(StoreError::Unavailable("timeout".into()).is_transient());
        assert!(!StoreError::Rejected("bad key".into()).is_transient());
        assert!(!StoreError::entry_not_found("e-1").is_transient());
    }

    #[test]
    fn test_missing_field_message() {
        let err = ConfigError::MissingField("api_key");
        assert_eq!(
            err.to_string(),
            "missing required field \"api_key\" in envzip.config"
        );
    }
}
