//! Encrypted balance ledger events (confidential-balance variant only).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use invoicechain_core::Address;
use invoicechain_events::Event;
use invoicechain_fhe::EncryptedHandle;

/// Event: an account's encrypted balance was increased by a deposit.
///
/// `balance` is the handle of the new balance, never the deposited amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDeposited {
    pub account: Address,
    pub balance: EncryptedHandle,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    BalanceDeposited(BalanceDeposited),
}

impl LedgerEvent {
    pub fn account(&self) -> Address {
        match self {
            LedgerEvent::BalanceDeposited(e) => e.account,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::BalanceDeposited(_) => "ledger.balance.deposited",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::BalanceDeposited(e) => e.occurred_at,
        }
    }

    fn stream(&self) -> String {
        format!("balance/{}", self.account())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_streams_by_account() {
        let account = Address::repeat_byte(0x11);
        let ev = LedgerEvent::BalanceDeposited(BalanceDeposited {
            account,
            balance: EncryptedHandle::from_bytes([2; 32]),
            occurred_at: DateTime::from_timestamp(0, 0).unwrap(),
        });

        assert_eq!(ev.event_type(), "ledger.balance.deposited");
        assert_eq!(ev.stream(), format!("balance/{account}"));
    }
}
