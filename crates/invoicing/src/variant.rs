use core::str::FromStr;

use serde::{Deserialize, Serialize};

use invoicechain_core::DomainError;

/// Amount model of a registry instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractVariant {
    /// Plaintext amounts, defaulted due dates, disputes.
    Plaintext,
    /// Encrypted amounts settled against a per-account encrypted balance ledger.
    ConfidentialBalance,
    /// Encrypted amounts stored directly on the record, no balance ledger.
    ConfidentialDirect,
}

impl ContractVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractVariant::Plaintext => "plaintext",
            ContractVariant::ConfidentialBalance => "confidential-balance",
            ContractVariant::ConfidentialDirect => "confidential-direct",
        }
    }

    pub fn is_confidential(self) -> bool {
        !matches!(self, ContractVariant::Plaintext)
    }

    pub fn has_balance_ledger(self) -> bool {
        matches!(self, ContractVariant::ConfidentialBalance)
    }

    pub fn supports_dispute(self) -> bool {
        !matches!(self, ContractVariant::ConfidentialBalance)
    }
}

impl core::fmt::Display for ContractVariant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractVariant {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plaintext" => Ok(ContractVariant::Plaintext),
            "confidential-balance" => Ok(ContractVariant::ConfidentialBalance),
            "confidential-direct" => Ok(ContractVariant::ConfidentialDirect),
            other => Err(DomainError::validation(format!(
                "unknown contract variant '{other}' (expected plaintext, confidential-balance or confidential-direct)"
            ))),
        }
    }
}
