//! Error types for the catalog discovery engines
//!
//! The engines themselves never hand errors to the caller: a failed read
//! degrades to defaults and a failed write is logged. These types exist for
//! the layers underneath (configuration loading and the key-value stores),
//! where a `Result` is still the honest return type.

use std::borrow::Cow;
use thiserror::Error;

/// Result type alias for catalog discovery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the catalog discovery engines
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Configuration error: {message}")]
    Config {
        message: Cow<'static, str>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig {
        key: &'static str,
        message: Cow<'static, str>,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    #[error("Storage error for key '{key}': {message}")]
    Storage {
        key: String,
        message: Cow<'static, str>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Caller Errors
    // ========================================================================
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: Cow<'static, str> },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error for a key
    pub fn storage(key: impl Into<String>, message: impl Into<Cow<'static, str>>) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error with source
    pub fn storage_with_source(
        key: impl Into<String>,
        message: impl Into<Cow<'static, str>>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage { .. } | Error::Io(_))
    }

    /// Stable code for logs and host-side error reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } | Error::InvalidConfig { .. } => "CONFIG_ERROR",
            Error::Storage { .. } | Error::Io(_) => "STORAGE_ERROR",
            Error::Json(_) => "SERIALIZATION_ERROR",
            Error::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(Error::storage("favorites", "disk full").is_retryable());
        assert!(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom")).is_retryable());
        assert!(!Error::invalid_argument("blank name").is_retryable());
        assert!(!Error::config("bad").is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::InvalidConfig {
                key: "SEARCH_FUZZY_THRESHOLD",
                message: "out of range".into()
            }
            .error_code(),
            "CONFIG_ERROR"
        );
        let json_err = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        assert_eq!(Error::from(json_err).error_code(), "SERIALIZATION_ERROR");
        assert_eq!(
            Error::from(anyhow::anyhow!("unexpected")).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_storage_error_message_names_key() {
        let err = Error::storage("savedFilters", "write rejected");
        assert_eq!(
            err.to_string(),
            "Storage error for key 'savedFilters': write rejected"
        );
    }
}
