//! Contract-side view of the FHE coprocessor.

use std::sync::Arc;

use invoicechain_core::Address;

use crate::{EncryptedHandle, ExternalCiphertext, FheResult, InputProof};

/// Operations the registry sequences on encrypted values.
///
/// Handles are opaque; every arithmetic call returns a fresh handle and never
/// reveals the underlying value. Callers must not branch on anything derived
/// from a handle: the same calls run regardless of the secret values.
pub trait FheCoprocessor: Send + Sync {
    /// Accept a client-encrypted input after verifying its proof binds it to
    /// `contract` and `user`.
    fn from_external(
        &self,
        ciphertext: &ExternalCiphertext,
        proof: &InputProof,
        contract: Address,
        user: Address,
    ) -> FheResult<EncryptedHandle>;

    /// Encrypt a public constant (e.g. the zero used to initialise balances).
    fn trivial_encrypt(&self, value: u64) -> FheResult<EncryptedHandle>;

    fn add(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> FheResult<EncryptedHandle>;

    /// Wrapping subtraction, as the encrypted integer type defines it.
    fn sub(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> FheResult<EncryptedHandle>;

    /// Encrypted `lhs >= rhs`, returned as an encrypted boolean handle.
    fn ge(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> FheResult<EncryptedHandle>;

    /// Encrypted `if cond { if_true } else { if_false }`.
    fn select(
        &self,
        cond: &EncryptedHandle,
        if_true: &EncryptedHandle,
        if_false: &EncryptedHandle,
    ) -> FheResult<EncryptedHandle>;

    /// Grant `account` persistent permission to use/decrypt `handle`.
    fn allow(&self, handle: &EncryptedHandle, account: Address) -> FheResult<()>;

    /// Grant the calling contract itself access to `handle`.
    fn allow_this(&self, handle: &EncryptedHandle, contract: Address) -> FheResult<()> {
        self.allow(handle, contract)
    }

    fn is_allowed(&self, handle: &EncryptedHandle, account: Address) -> FheResult<bool>;
}

impl<C> FheCoprocessor for Arc<C>
where
    C: FheCoprocessor + ?Sized,
{
    fn from_external(
        &self,
        ciphertext: &ExternalCiphertext,
        proof: &InputProof,
        contract: Address,
        user: Address,
    ) -> FheResult<EncryptedHandle> {
        (**self).from_external(ciphertext, proof, contract, user)
    }

    fn trivial_encrypt(&self, value: u64) -> FheResult<EncryptedHandle> {
        (**self).trivial_encrypt(value)
    }

    fn add(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> FheResult<EncryptedHandle> {
        (**self).add(lhs, rhs)
    }

    fn sub(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> FheResult<EncryptedHandle> {
        (**self).sub(lhs, rhs)
    }

    fn ge(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> FheResult<EncryptedHandle> {
        (**self).ge(lhs, rhs)
    }

    fn select(
        &self,
        cond: &EncryptedHandle,
        if_true: &EncryptedHandle,
        if_false: &EncryptedHandle,
    ) -> FheResult<EncryptedHandle> {
        (**self).select(cond, if_true, if_false)
    }

    fn allow(&self, handle: &EncryptedHandle, account: Address) -> FheResult<()> {
        (**self).allow(handle, account)
    }

    fn allow_this(&self, handle: &EncryptedHandle, contract: Address) -> FheResult<()> {
        (**self).allow_this(handle, contract)
    }

    fn is_allowed(&self, handle: &EncryptedHandle, account: Address) -> FheResult<bool> {
        (**self).is_allowed(handle, account)
    }
}
