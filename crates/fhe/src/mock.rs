//! Cleartext-backed coprocessor for development and tests.
//!
//! Values are kept in memory behind hash-derived handles; nothing is encrypted.
//! Access grants and input proofs are still enforced so callers exercise the
//! same failure paths they would against a real platform.
//!
//! State lives only as long as the instance. Handles are salted per instance,
//! so a handle persisted by one process never resolves in another.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use invoicechain_core::Address;

use crate::{
    EncryptedHandle, ExternalCiphertext, FheCoprocessor, FheError, FheResult, InputProof, Relayer,
};

const HANDLE_DOMAIN: &[u8] = b"invoicechain.mock.handle";
const INPUT_DOMAIN: &[u8] = b"invoicechain.mock.input";
const PROOF_DOMAIN: &[u8] = b"invoicechain.mock.proof";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cleartext {
    U64(u64),
    Bool(bool),
}

#[derive(Debug)]
struct MockState {
    salt: [u8; 16],
    nonce: u64,
    values: HashMap<EncryptedHandle, Cleartext>,
    inputs: HashMap<Vec<u8>, u64>,
    acl: HashSet<(EncryptedHandle, Address)>,
}

impl MockState {
    fn new(salt: [u8; 16]) -> Self {
        Self {
            salt,
            nonce: 0,
            values: HashMap::new(),
            inputs: HashMap::new(),
            acl: HashSet::new(),
        }
    }

    fn next_digest(&mut self, domain: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        hasher.update(self.salt);
        hasher.update(self.nonce.to_be_bytes());
        self.nonce += 1;
        hasher.finalize().into()
    }

    fn store(&mut self, value: Cleartext) -> EncryptedHandle {
        let handle = EncryptedHandle::from_bytes(self.next_digest(HANDLE_DOMAIN));
        self.values.insert(handle, value);
        handle
    }

    fn load(&self, handle: &EncryptedHandle) -> FheResult<Cleartext> {
        self.values
            .get(handle)
            .copied()
            .ok_or(FheError::UnknownHandle(*handle))
    }

    fn load_u64(&self, handle: &EncryptedHandle) -> FheResult<u64> {
        match self.load(handle)? {
            Cleartext::U64(v) => Ok(v),
            Cleartext::Bool(_) => Err(FheError::TypeMismatch(format!(
                "{handle} is an encrypted bool, expected u64"
            ))),
        }
    }

    fn load_bool(&self, handle: &EncryptedHandle) -> FheResult<bool> {
        match self.load(handle)? {
            Cleartext::Bool(b) => Ok(b),
            Cleartext::U64(_) => Err(FheError::TypeMismatch(format!(
                "{handle} is an encrypted u64, expected bool"
            ))),
        }
    }
}

fn input_proof(ciphertext: &[u8], contract: Address, user: Address) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(PROOF_DOMAIN);
    hasher.update(ciphertext);
    hasher.update(contract.as_bytes());
    hasher.update(user.as_bytes());
    hasher.finalize().to_vec()
}

/// In-memory coprocessor + relayer. Share one instance between the registry
/// and its clients so handles resolve on both sides.
#[derive(Debug)]
pub struct MockCoprocessor {
    state: RwLock<MockState>,
}

impl Default for MockCoprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCoprocessor {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState::new(Uuid::now_v7().into_bytes())),
        }
    }

    fn read(&self) -> FheResult<RwLockReadGuard<'_, MockState>> {
        self.state
            .read()
            .map_err(|_| FheError::backend("mock coprocessor state poisoned"))
    }

    fn write(&self) -> FheResult<RwLockWriteGuard<'_, MockState>> {
        self.state
            .write()
            .map_err(|_| FheError::backend("mock coprocessor state poisoned"))
    }

    fn binary_u64(
        &self,
        lhs: &EncryptedHandle,
        rhs: &EncryptedHandle,
        op: impl FnOnce(u64, u64) -> Cleartext,
    ) -> FheResult<EncryptedHandle> {
        let mut state = self.write()?;
        let a = state.load_u64(lhs)?;
        let b = state.load_u64(rhs)?;
        Ok(state.store(op(a, b)))
    }
}

impl FheCoprocessor for MockCoprocessor {
    fn from_external(
        &self,
        ciphertext: &ExternalCiphertext,
        proof: &InputProof,
        contract: Address,
        user: Address,
    ) -> FheResult<EncryptedHandle> {
        if input_proof(&ciphertext.0, contract, user) != proof.0 {
            tracing::debug!(%contract, %user, "mock coprocessor rejected input proof");
            return Err(FheError::InvalidProof);
        }
        let mut state = self.write()?;
        let value = *state
            .inputs
            .get(&ciphertext.0)
            .ok_or_else(|| FheError::malformed("unknown input ciphertext"))?;
        Ok(state.store(Cleartext::U64(value)))
    }

    fn trivial_encrypt(&self, value: u64) -> FheResult<EncryptedHandle> {
        Ok(self.write()?.store(Cleartext::U64(value)))
    }

    fn add(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> FheResult<EncryptedHandle> {
        self.binary_u64(lhs, rhs, |a, b| Cleartext::U64(a.wrapping_add(b)))
    }

    fn sub(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> FheResult<EncryptedHandle> {
        self.binary_u64(lhs, rhs, |a, b| Cleartext::U64(a.wrapping_sub(b)))
    }

    fn ge(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> FheResult<EncryptedHandle> {
        self.binary_u64(lhs, rhs, |a, b| Cleartext::Bool(a >= b))
    }

    fn select(
        &self,
        cond: &EncryptedHandle,
        if_true: &EncryptedHandle,
        if_false: &EncryptedHandle,
    ) -> FheResult<EncryptedHandle> {
        let mut state = self.write()?;
        let c = state.load_bool(cond)?;
        let t = state.load(if_true)?;
        let f = state.load(if_false)?;
        if core::mem::discriminant(&t) != core::mem::discriminant(&f) {
            return Err(FheError::TypeMismatch(
                "select branches have different types".to_string(),
            ));
        }
        Ok(state.store(if c { t } else { f }))
    }

    fn allow(&self, handle: &EncryptedHandle, account: Address) -> FheResult<()> {
        let mut state = self.write()?;
        state.load(handle)?;
        state.acl.insert((*handle, account));
        Ok(())
    }

    fn is_allowed(&self, handle: &EncryptedHandle, account: Address) -> FheResult<bool> {
        Ok(self.read()?.acl.contains(&(*handle, account)))
    }
}

impl Relayer for MockCoprocessor {
    fn encrypt_input(
        &self,
        value: u64,
        contract: Address,
        user: Address,
    ) -> FheResult<(ExternalCiphertext, InputProof)> {
        let mut state = self.write()?;
        let ciphertext = state.next_digest(INPUT_DOMAIN).to_vec();
        state.inputs.insert(ciphertext.clone(), value);
        let proof = input_proof(&ciphertext, contract, user);
        Ok((ExternalCiphertext(ciphertext), InputProof(proof)))
    }

    fn user_decrypt(&self, handle: &EncryptedHandle, user: Address) -> FheResult<u64> {
        let state = self.read()?;
        if !state.acl.contains(&(*handle, user)) {
            return Err(FheError::AccessDenied {
                handle: *handle,
                account: user,
            });
        }
        state.load_u64(handle)
    }
}
