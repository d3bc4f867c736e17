//! Common error types for classroom components.

use thiserror::Error;

/// Errors raised while parsing shared identifiers and enums.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Identifier was empty or whitespace only
    #[error("Empty identifier: {0}")]
    EmptyIdentifier(&'static str),

    /// Role string did not match a known role
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias using `CommonError`
pub type Result<T> = std::result::Result<T, CommonError>;
