//! Client-side view of the relayer (input encryption, user decryption).

use std::sync::Arc;

use invoicechain_core::Address;

use crate::{EncryptedHandle, ExternalCiphertext, FheResult, InputProof};

/// Off-chain service that prepares encrypted inputs and serves decryptions.
pub trait Relayer: Send + Sync {
    /// Encrypt `value` for submission by `user` to `contract`.
    fn encrypt_input(
        &self,
        value: u64,
        contract: Address,
        user: Address,
    ) -> FheResult<(ExternalCiphertext, InputProof)>;

    /// Decrypt `handle` on behalf of `user`, who must hold an access grant.
    fn user_decrypt(&self, handle: &EncryptedHandle, user: Address) -> FheResult<u64>;
}

impl<R> Relayer for Arc<R>
where
    R: Relayer + ?Sized,
{
    fn encrypt_input(
        &self,
        value: u64,
        contract: Address,
        user: Address,
    ) -> FheResult<(ExternalCiphertext, InputProof)> {
        (**self).encrypt_input(value, contract, user)
    }

    fn user_decrypt(&self, handle: &EncryptedHandle, user: Address) -> FheResult<u64> {
        (**self).user_decrypt(handle, user)
    }
}
