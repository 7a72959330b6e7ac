use thiserror::Error;

use invoicechain_core::Address;

use crate::EncryptedHandle;

pub type FheResult<T> = Result<T, FheError>;

/// Failures reported by the coprocessor or relayer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FheError {
    /// The input proof does not bind the ciphertext to this contract and user.
    #[error("input proof rejected")]
    InvalidProof,

    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(EncryptedHandle),

    /// An operand had the wrong encrypted type (e.g. a bool where a u64 was expected).
    #[error("operand type mismatch: {0}")]
    TypeMismatch(String),

    #[error("{account} is not allowed to access {handle}")]
    AccessDenied {
        handle: EncryptedHandle,
        account: Address,
    },

    #[error("malformed input: {0}")]
    Malformed(String),

    /// Transport or service failure of the external platform.
    #[error("coprocessor backend failure: {0}")]
    Backend(String),
}

impl FheError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
