//! Registry configuration, read from environment variables.
//!
//! Parsing goes through a lookup function so callers (and tests) can supply
//! any source; `from_env` binds it to the process environment.

use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use invoicechain_core::Address;
use invoicechain_invoicing::ContractVariant;

use crate::repository::Page;

pub const ENV_VARIANT: &str = "INVOICE_VARIANT";
pub const ENV_CONTRACT_ADDRESS: &str = "INVOICE_CONTRACT_ADDRESS";
pub const ENV_STORE: &str = "INVOICE_STORE";
pub const ENV_SLED_PATH: &str = "INVOICE_SLED_PATH";
pub const ENV_MAX_PAGE_SIZE: &str = "INVOICE_MAX_PAGE_SIZE";

pub const DEFAULT_SLED_PATH: &str = ".invoicechain";

/// Address used when none is configured. Development only.
pub const DEV_CONTRACT_ADDRESS: Address = Address::repeat_byte(0x1c);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            message: message.into(),
        }
    }
}

/// Where ledger state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    Sled { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub variant: ContractVariant,
    pub contract: Address,
    pub storage: StorageConfig,
    pub max_page_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            variant: ContractVariant::Plaintext,
            contract: DEV_CONTRACT_ADDRESS,
            storage: StorageConfig::Memory,
            max_page_size: Page::DEFAULT_LIMIT,
        }
    }
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let variant = match get(ENV_VARIANT) {
            Some(raw) => raw
                .parse::<ContractVariant>()
                .map_err(|e| ConfigError::invalid(ENV_VARIANT, e.to_string()))?,
            None => defaults.variant,
        };

        let contract = match get(ENV_CONTRACT_ADDRESS) {
            Some(raw) => raw
                .trim()
                .parse::<Address>()
                .map_err(|e| ConfigError::invalid(ENV_CONTRACT_ADDRESS, e.to_string()))?,
            None => {
                warn!(
                    contract = %defaults.contract,
                    "{ENV_CONTRACT_ADDRESS} not set; using the development contract address"
                );
                defaults.contract
            }
        };
        if contract.is_zero() {
            return Err(ConfigError::invalid(
                ENV_CONTRACT_ADDRESS,
                "the zero address cannot identify a registry",
            ));
        }

        let storage = match get(ENV_STORE).map(|s| s.trim().to_ascii_lowercase()) {
            None => defaults.storage,
            Some(kind) if kind == "memory" => StorageConfig::Memory,
            Some(kind) if kind == "sled" => StorageConfig::Sled {
                path: get(ENV_SLED_PATH)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SLED_PATH)),
            },
            Some(other) => {
                return Err(ConfigError::invalid(
                    ENV_STORE,
                    format!("unknown store '{other}' (expected memory or sled)"),
                ));
            }
        };

        // The only coprocessor available keeps ciphertexts in process memory, so
        // encrypted handles written to disk would dangle after a restart.
        if variant.is_confidential() && matches!(storage, StorageConfig::Sled { .. }) {
            return Err(ConfigError::invalid(
                ENV_STORE,
                format!(
                    "the {variant} variant cannot use the sled store: coprocessor state is not persisted"
                ),
            ));
        }

        let max_page_size = match get(ENV_MAX_PAGE_SIZE) {
            Some(raw) => {
                let n = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| ConfigError::invalid(ENV_MAX_PAGE_SIZE, e.to_string()))?;
                if n == 0 {
                    return Err(ConfigError::invalid(ENV_MAX_PAGE_SIZE, "must be at least 1"));
                }
                n
            }
            None => defaults.max_page_size,
        };

        Ok(Self {
            variant,
            contract,
            storage,
            max_page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = RegistryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, RegistryConfig::default());
    }

    #[test]
    fn reads_every_setting() {
        let cfg = RegistryConfig::from_lookup(lookup(&[
            (ENV_VARIANT, "plaintext"),
            (ENV_CONTRACT_ADDRESS, "0x00000000000000000000000000000000000000aa"),
            (ENV_STORE, "SLED"),
            (ENV_SLED_PATH, "/var/lib/invoices"),
            (ENV_MAX_PAGE_SIZE, "25"),
        ]))
        .unwrap();

        assert_eq!(cfg.variant, ContractVariant::Plaintext);
        assert_eq!(
            cfg.contract.to_string(),
            "0x00000000000000000000000000000000000000aa"
        );
        assert_eq!(
            cfg.storage,
            StorageConfig::Sled {
                path: PathBuf::from("/var/lib/invoices")
            }
        );
        assert_eq!(cfg.max_page_size, 25);
    }

    #[test]
    fn confidential_variants_cannot_persist_to_sled() {
        for variant in ["confidential-balance", "confidential-direct"] {
            let err = RegistryConfig::from_lookup(lookup(&[
                (ENV_VARIANT, variant),
                (ENV_STORE, "sled"),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: ENV_STORE, .. }));
        }

        let cfg = RegistryConfig::from_lookup(lookup(&[
            (ENV_VARIANT, "confidential-balance"),
            (ENV_STORE, "memory"),
        ]))
        .unwrap();
        assert_eq!(cfg.storage, StorageConfig::Memory);
    }

    #[test]
    fn sled_path_has_a_default() {
        let cfg = RegistryConfig::from_lookup(lookup(&[(ENV_STORE, "sled")])).unwrap();
        assert_eq!(
            cfg.storage,
            StorageConfig::Sled {
                path: PathBuf::from(DEFAULT_SLED_PATH)
            }
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (key, value) in [
            (ENV_VARIANT, "fhevm"),
            (ENV_CONTRACT_ADDRESS, "0x1234"),
            (ENV_CONTRACT_ADDRESS, "0x0000000000000000000000000000000000000000"),
            (ENV_STORE, "postgres"),
            (ENV_MAX_PAGE_SIZE, "0"),
            (ENV_MAX_PAGE_SIZE, "lots"),
        ] {
            let err = RegistryConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            let ConfigError::Invalid { key: got, .. } = err;
            assert_eq!(got, key);
        }
    }
}
