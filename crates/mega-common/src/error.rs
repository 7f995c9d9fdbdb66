//! Error types for shared configuration handling.

use std::io;
use thiserror::Error;

/// Result type alias for common operations.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum CommonError {
    /// Configuration file could not be parsed or serialized.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration value failed validation.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CommonError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = CommonError::invalid_config("vlans.min", "must be <= vlans.max");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for vlans.min: must be <= vlans.max"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: CommonError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().starts_with("IO error"));
    }
}
