//! Shared domain errors.

use thiserror::Error;

/// Errors raised by domain value objects and services.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation.
    #[error("invalid {field}: {message}")]
    InvalidValue {
        /// Field that failed validation.
        field: String,
        /// What was wrong with it.
        message: String,
    },
}
