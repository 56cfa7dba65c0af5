//! Error types for Flowsmith.
//!
//! Library crates use [`FlowsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Flowsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum FlowsmithError {
    /// Configuration error: missing credential, unreadable config file, etc.
    /// Actionable by the user.
    #[error("config error: {message}")]
    Config { message: String },

    /// Oracle transport or provider failure.
    #[error("oracle error: {0}")]
    Oracle(String),

    /// Oracle output (or a registry file) could not be decoded.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Failure while synthesizing flow nodes or edges.
    #[error("construction error: {0}")]
    Construction(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Caller-supplied input rejected.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FlowsmithError>;

/// Coarse classification of an error, used at API boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Oracle,
    Internal,
}

impl ErrorKind {
    /// Whether the caller can fix this themselves (maps to a 4xx-class outcome).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Configuration)
    }
}

impl FlowsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for the API boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } | Self::Validation { .. } => ErrorKind::Configuration,
            Self::Oracle(_) => ErrorKind::Oracle,
            _ => ErrorKind::Internal,
        }
    }
}
