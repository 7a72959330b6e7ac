//! Boundary to the external FHE coprocessor and relayer.
//!
//! Nothing in this crate implements cryptography. The registry only forwards
//! opaque handles and access grants through [`FheCoprocessor`]; clients
//! encrypt inputs and decrypt results through a [`Relayer`].
//! [`MockCoprocessor`] is a cleartext stand-in for development and tests.

pub mod coprocessor;
pub mod error;
pub mod handle;
pub mod mock;
pub mod relayer;

pub use coprocessor::FheCoprocessor;
pub use error::{FheError, FheResult};
pub use handle::{EncryptedHandle, ExternalCiphertext, InputProof};
pub use mock::MockCoprocessor;
pub use relayer::Relayer;
