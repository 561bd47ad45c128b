//! Errors raised by the pure domain crates.
//!
//! Lookups, uniqueness and authorization are decided by the services that own
//! storage, so the domain only reports bad input and broken invariants.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Caller input was rejected: blank delivery details, zero quantities,
    /// malformed order numbers.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Stored or computed state that can never be produced by valid
    /// operations, such as a persisted cart line with zero quantity.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An id string that is not a UUID.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
