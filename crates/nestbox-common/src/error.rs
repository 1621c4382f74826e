//! Unified error types for the nestbox workspace.
//!
//! Higher-level crates wrap these variants with the context of what they
//! were attempting (see the runtime's stage errors).

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum NestboxError {
    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A system call failed.
    #[error("{call}({target}) failed: {source}")]
    Sys {
        /// Name of the system call.
        call: &'static str,
        /// Argument that identifies what the call operated on.
        target: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The running kernel lacks a required feature.
    #[error("unsupported platform: {message}")]
    Unsupported {
        /// Description of the missing feature.
        message: String,
    },

    /// Creating, synchronising with, or waiting for a child process failed.
    #[error("process control failed: {message}")]
    Spawn {
        /// Description of the failed operation.
        message: String,
    },
}

impl NestboxError {
    /// Builds an [`NestboxError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds an [`NestboxError::Sys`] from anything convertible to an OS error.
    pub fn sys(
        call: &'static str,
        target: impl ToString,
        source: impl Into<std::io::Error>,
    ) -> Self {
        Self::Sys {
            call,
            target: target.to_string(),
            source: source.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, NestboxError>;

/// Renders `err` and its sources as one `: `-separated line.
///
/// A source whose message already ends the line is skipped; [`NestboxError`]
/// variants carry their OS error in their own message.
#[must_use]
pub fn render_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut line = err.to_string();
    let mut next = err.source();
    while let Some(cause) = next {
        let text = cause.to_string();
        if !line.ends_with(&text) {
            line.push_str(": ");
            line.push_str(&text);
        }
        next = cause.source();
    }
    line
}
