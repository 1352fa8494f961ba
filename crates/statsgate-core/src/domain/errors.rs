//! Domain error types
//!
//! Errors raised while constructing validated domain values: provider
//! identifiers, schedule dates and rate budgets.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Provider identifier is empty or contains characters that are not URL-path safe
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    /// Schedule date could not be parsed
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Rate budget parameters are out of range
    #[error("Invalid rate budget: {0}")]
    InvalidBudget(String),

    /// Retry backoff parameters are out of range
    #[error("Invalid retry backoff: {0}")]
    InvalidBackoff(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidId("a/b".to_string());
        assert_eq!(err.to_string(), "Invalid identifier: a/b");

        let err = DomainError::InvalidBudget("burst must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid rate budget: burst must be at least 1"
        );
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidDate("2026-13-01".to_string());
        let err2 = DomainError::InvalidDate("2026-13-01".to_string());
        let err3 = DomainError::InvalidDate("yesterday".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
