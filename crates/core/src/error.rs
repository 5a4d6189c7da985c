//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Business-rule failures raised by entities and their guards.
///
/// Storage and transport failures are not represented here; the service layer
/// wraps this type alongside its own store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is illegal in the record's current state
    /// (status transition, returning more than was rented).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Missing or soft-deleted record.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate code or name, or a second open return for one rental.
    #[error("conflict: {0}")]
    Conflict(String),
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

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Stable machine-readable code, used as the `error` field of API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::InvalidId(_) => "invalid_id",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
        }
    }

    /// Detail text without the category prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::InvariantViolation(m)
            | Self::InvalidId(m)
            | Self::NotFound(m)
            | Self::Conflict(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_category_and_detail() {
        let err = DomainError::not_found("customer 42");
        assert_eq!(err.to_string(), "not found: customer 42");
        assert_eq!(err.detail(), "customer 42");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            DomainError::validation("").code(),
            DomainError::invariant("").code(),
            DomainError::invalid_id("").code(),
            DomainError::not_found("").code(),
            DomainError::conflict("").code(),
        ];
        let mut unique = codes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
    }
}
