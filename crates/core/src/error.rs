//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (guards,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The referenced record does not exist (zero sender).
    #[error("not found")]
    NotFound,

    /// The caller does not hold the role the operation requires.
    #[error("unauthorized")]
    Unauthorized,

    /// The record is not in the lifecycle state the operation requires.
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// Recipient is the zero address or the caller itself.
    #[error("invalid recipient")]
    InvalidRecipient,

    /// Amount is zero (plaintext amounts only).
    #[error("invalid amount")]
    InvalidAmount,

    /// Plaintext balance check failed. The encrypted payment path never
    /// raises this; insufficiency there moves an encrypted zero instead.
    #[error("insufficient balance")]
    InsufficientBalance,

    /// The operation is not offered by this contract variant.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A conflict occurred (duplicate creation, stale version).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid_status(msg: impl Into<String>) -> Self {
        Self::InvalidStatus(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Stable machine-readable code, used by transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound => "not_found",
            DomainError::Unauthorized => "unauthorized",
            DomainError::InvalidStatus(_) => "invalid_status",
            DomainError::InvalidRecipient => "invalid_recipient",
            DomainError::InvalidAmount => "invalid_amount",
            DomainError::InsufficientBalance => "insufficient_balance",
            DomainError::UnsupportedOperation(_) => "unsupported_operation",
            DomainError::Validation(_) => "validation_error",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::Conflict(_) => "conflict",
        }
    }
}
