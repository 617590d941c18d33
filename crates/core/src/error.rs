//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Business methods return one of these *before* raising any event, so an
/// `Err` always leaves the aggregate untouched. Messages carry the aggregate id
/// and the offending value so a boundary layer can translate them without
/// inspecting aggregate state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (range, length, format).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant or state-machine guard was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (non-positive, parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced child entity does not exist in the aggregate.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Optimistic concurrency mismatch. The only retryable kind.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Event replay was misused or could not be completed.
    #[error("replay failed: {0}")]
    Replay(String),
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

    pub fn replay(msg: impl Into<String>) -> Self {
        Self::Replay(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Prefix the message with the owning aggregate, e.g. `stock 42: ...`.
    ///
    /// `NotFound` already names its entity and id and is returned unchanged.
    pub fn context(self, owner: impl core::fmt::Display) -> Self {
        match self {
            Self::Validation(msg) => Self::Validation(format!("{owner}: {msg}")),
            Self::InvariantViolation(msg) => Self::InvariantViolation(format!("{owner}: {msg}")),
            Self::InvalidId(msg) => Self::InvalidId(format!("{owner}: {msg}")),
            Self::Conflict(msg) => Self::Conflict(format!("{owner}: {msg}")),
            Self::Replay(msg) => Self::Replay(format!("{owner}: {msg}")),
            not_found @ Self::NotFound { .. } => not_found,
        }
    }

    /// Whether the caller may reload and retry the unit of work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(DomainError::conflict("stale").is_retryable());
        assert!(!DomainError::validation("bad").is_retryable());
        assert!(!DomainError::invariant("deleted").is_retryable());
        assert!(!DomainError::not_found("image", 7).is_retryable());
        assert!(!DomainError::replay("dirty").is_retryable());
    }

    #[test]
    fn context_prefixes_owner_and_keeps_kind() {
        let err =
            DomainError::validation("count must be greater than zero, got 0").context("stock 9");
        assert_eq!(
            err,
            DomainError::Validation("stock 9: count must be greater than zero, got 0".into())
        );
        assert!(DomainError::conflict("stale").context("stock 9").is_retryable());

        let missing = DomainError::not_found("image", "abc");
        assert_eq!(missing.clone().context("media 1"), missing);
    }

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = DomainError::not_found("image", "abc");
        assert_eq!(err.to_string(), "image abc not found");
    }
}
