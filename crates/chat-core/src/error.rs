//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Screen name was empty after trimming the line terminator
    #[error("Screen name must not be empty")]
    EmptyName,

    /// Screen name contains a whitespace character
    #[error("Screen name must not contain whitespace: {name:?}")]
    NameContainsWhitespace { name: String },

    /// Screen name exceeds the maximum length
    #[error("Screen name too long: {len} bytes (max: {max})")]
    NameTooLong { len: usize, max: usize },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
