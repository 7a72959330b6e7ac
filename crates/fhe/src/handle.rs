//! Opaque references to coprocessor-managed ciphertexts, and client inputs.

use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FheError;

/// Opaque 32-byte reference to a ciphertext held by the coprocessor.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncryptedHandle([u8; 32]);

impl EncryptedHandle {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, FheError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| FheError::malformed(format!("handle must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }
}

impl core::fmt::Display for EncryptedHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl core::fmt::Debug for EncryptedHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "EncryptedHandle({self})")
    }
}

impl FromStr for EncryptedHandle {
    type Err = FheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(&decode_hex(s)?)
    }
}

impl Serialize for EncryptedHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EncryptedHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Client-side encrypted input, as produced by a [`crate::Relayer`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalCiphertext(#[serde(with = "hex_bytes")] pub Vec<u8>);

/// Proof binding an [`ExternalCiphertext`] to a contract and a user.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputProof(#[serde(with = "hex_bytes")] pub Vec<u8>);

impl core::fmt::Debug for ExternalCiphertext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ExternalCiphertext(0x{})", hex::encode(&self.0))
    }
}

impl core::fmt::Debug for InputProof {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "InputProof(0x{})", hex::encode(&self.0))
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, FheError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| FheError::malformed(e.to_string()))
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_hex(&s).map_err(serde::de::Error::custom)
    }
}
