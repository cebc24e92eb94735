//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every ledger operation fails with exactly one of these kinds, and every kind
/// is detected before any staged write is committed, so a failure always means
/// "nothing happened". Storage-engine detail never appears in the message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input (caller error).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist for this tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// Requested quantity exceeds available (or cleared, for sales) stock.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    /// A return proposal exceeds the assignment's unaccounted quantity.
    #[error("over allocation: {0}")]
    OverAllocation(String),

    /// An outstanding return request already holds the assignment's lock.
    #[error("lock conflict: {0}")]
    LockConflict(String),

    /// Review attempted on a request that is no longer pending.
    #[error("already reviewed: {0}")]
    AlreadyReviewed(String),

    /// The unit of work could not be serialized within its bounds. Retryable.
    #[error("contention: {0}")]
    Contention(String),

    /// A ledger invariant was found broken. Indicates a bug, not bad input.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn insufficient_stock(msg: impl Into<String>) -> Self {
        Self::InsufficientStock(msg.into())
    }

    pub fn over_allocation(msg: impl Into<String>) -> Self {
        Self::OverAllocation(msg.into())
    }

    pub fn lock_conflict(msg: impl Into<String>) -> Self {
        Self::LockConflict(msg.into())
    }

    pub fn already_reviewed(msg: impl Into<String>) -> Self {
        Self::AlreadyReviewed(msg.into())
    }

    pub fn contention(msg: impl Into<String>) -> Self {
        Self::Contention(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Stable machine-readable code for this error kind.
    ///
    /// These strings are part of the external contract; do not rename them.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound(_) => "not_found",
            DomainError::InsufficientStock(_) => "insufficient_stock",
            DomainError::OverAllocation(_) => "over_allocation",
            DomainError::LockConflict(_) => "lock_conflict",
            DomainError::AlreadyReviewed(_) => "already_reviewed",
            DomainError::Contention(_) => "contention",
            DomainError::InvariantViolation(_) => "invariant_violation",
        }
    }

    /// Only contention is safe to retry blindly; everything else needs
    /// corrected input or a different action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Contention(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let cases = [
            (DomainError::validation("x"), "validation_error"),
            (DomainError::not_found("x"), "not_found"),
            (DomainError::insufficient_stock("x"), "insufficient_stock"),
            (DomainError::over_allocation("x"), "over_allocation"),
            (DomainError::lock_conflict("x"), "lock_conflict"),
            (DomainError::already_reviewed("x"), "already_reviewed"),
            (DomainError::contention("x"), "contention"),
            (DomainError::invariant("x"), "invariant_violation"),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn only_contention_is_retryable() {
        assert!(DomainError::contention("busy").is_retryable());
        assert!(!DomainError::lock_conflict("held").is_retryable());
        assert!(!DomainError::insufficient_stock("short").is_retryable());
    }

    #[test]
    fn message_carries_context() {
        let err = DomainError::not_found("product 42");
        assert_eq!(err.to_string(), "not found: product 42");
    }
}
