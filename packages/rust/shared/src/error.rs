//! Error types for citesync.
//!
//! Library crates use [`CitesyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all citesync operations.
#[derive(Debug, thiserror::Error)]
pub enum CitesyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during page fetch or store access.
    #[error("network error: {0}")]
    Network(String),

    /// Structured data, date, or message parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Record store rejected a read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// Streaming protocol error (bad handshake, rejected subscription, transport fault).
    #[error("stream error: {message}")]
    Stream { message: String },

    /// The streaming connection was closed by the peer.
    #[error("stream connection closed")]
    ConnectionClosed,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, unexpected shape, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CitesyncError>;

impl CitesyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a stream protocol error from any displayable message.
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream {
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

    /// Whether this error means the stream peer hung up.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}
