//! Error types for the knowledge pathway engine.
//!
//! Library crates use [`ParenthesesError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all engine operations.
#[derive(Debug, thiserror::Error)]
pub enum ParenthesesError {
    /// Submission rejected (structure, quality threshold, version format, duplicate).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The external ledger capability failed or timed out.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Query or stats read against a domain that has no pathway.
    #[error("domain not found: {domain}")]
    NotFound { domain: String },

    /// Centrality or pruning could not be computed for a pathway.
    #[error("graph error: {0}")]
    Graph(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON encoding or decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ParenthesesError>;

impl ParenthesesError {
    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a ledger error from any displayable message.
    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }

    /// Create a not-found error for the given domain.
    pub fn not_found(domain: impl Into<String>) -> Self {
        Self::NotFound {
            domain: domain.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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
}

impl From<serde_json::Error> for ParenthesesError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ParenthesesError::validation("content score 0.42 below threshold 0.85");
        assert_eq!(
            err.to_string(),
            "validation error: content score 0.42 below threshold 0.85"
        );

        let err = ParenthesesError::not_found("vision");
        assert_eq!(err.to_string(), "domain not found: vision");

        let err = ParenthesesError::ledger("submit timed out after 30s");
        assert!(err.to_string().starts_with("ledger error:"));
    }

    #[test]
    fn json_errors_convert() {
        let err: ParenthesesError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, ParenthesesError::Serialization(_)));
    }
}
