//! Process-level error types for the Gatehouse service.
//!
//! Request-level failures (validation, auth, persistence constraints) live in
//! [`crate::errors`]; this module only covers what can stop the service itself.

use thiserror::Error;

/// Main error type for Gatehouse startup and serving.
#[derive(Error, Debug)]
pub enum GatehouseError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for GatehouseError {
    fn from(e: config::ConfigError) -> Self {
        GatehouseError::Config(e.to_string())
    }
}

/// Result type alias for Gatehouse operations.
pub type Result<T> = std::result::Result<T, GatehouseError>;
