//! Invoicing domain module.
//!
//! Business rules for the invoice lifecycle and the confidential balance
//! ledger, implemented purely as deterministic domain logic (no IO, no
//! storage, no coprocessor calls).

pub mod balance;
pub mod invoice;
pub mod variant;

pub use balance::{BalanceDeposited, LedgerEvent};
pub use invoice::{
    CancelInvoice, CreateInvoice, DEFAULT_DUE_PERIOD_DAYS, DisputeInvoice, Invoice, InvoiceAmount,
    InvoiceCancelled, InvoiceCommand, InvoiceCreated, InvoiceDisputed, InvoiceEvent, InvoiceId,
    InvoicePaid, InvoiceRecord, InvoiceStatus, PayInvoice, ensure_distinct_parties,
};
pub use variant::ContractVariant;
