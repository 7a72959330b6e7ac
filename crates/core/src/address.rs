//! Account addresses (the identity of every caller, sender and recipient).

use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DomainError;

/// A 20-byte account address.
///
/// The zero address is never a valid party; it doubles as the "absent" marker
/// for records that were never created.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const LEN: usize = 20;

    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address whose every byte is `byte`. Handy for fixtures.
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; 20])
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DomainError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| {
            DomainError::invalid_id(format!(
                "Address: expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl core::fmt::Debug for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() != Self::LEN * 2 {
            return Err(DomainError::invalid_id(format!(
                "Address: expected {} hex digits, got {}",
                Self::LEN * 2,
                digits.len()
            )));
        }
        let bytes = hex::decode(digits)
            .map_err(|e| DomainError::invalid_id(format!("Address: {e}")))?;
        Self::from_slice(&bytes)
    }
}

impl From<[u8; 20]> for Address {
    fn from(value: [u8; 20]) -> Self {
        Self(value)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_address_is_zero() {
        assert!(Address::ZERO.is_zero());
        assert!(Address::default().is_zero());
        assert!(!Address::repeat_byte(1).is_zero());
    }

    #[test]
    fn display_is_prefixed_lowercase_hex() {
        let a = Address::repeat_byte(0xab);
        assert_eq!(a.to_string(), format!("0x{}", "ab".repeat(20)));
    }

    #[test]
    fn parse_accepts_mixed_case_and_missing_prefix() {
        let upper = format!("0x{}", "AB".repeat(20));
        let bare = "ab".repeat(20);
        assert_eq!(upper.parse::<Address>().unwrap(), Address::repeat_byte(0xab));
        assert_eq!(bare.parse::<Address>().unwrap(), Address::repeat_byte(0xab));
    }

    #[test]
    fn parse_rejects_wrong_length_and_garbage() {
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(DomainError::InvalidId(_))
        ));
        let garbage = format!("0x{}", "zz".repeat(20));
        assert!(matches!(
            garbage.parse::<Address>(),
            Err(DomainError::InvalidId(_))
        ));
    }

    #[test]
    fn serde_uses_textual_form() {
        let a = Address::repeat_byte(0x11);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "11".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(bytes in prop::array::uniform20(any::<u8>())) {
            let a = Address::from_bytes(bytes);
            prop_assert_eq!(a.to_string().parse::<Address>().unwrap(), a);
        }
    }
}
