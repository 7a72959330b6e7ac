//! Ledger state persistence.
//!
//! The registry keeps current state (records, indices, balances) rather than an
//! event log, because a confidential payment updates two balances and one
//! invoice in a single atomic step. Every mutation is expressed as a
//! [`ChangeSet`] and committed all-or-nothing.

pub mod in_memory;
pub mod sled_store;

pub use self::in_memory::InMemoryInvoiceRepository;
pub use self::sled_store::SledInvoiceRepository;

use std::sync::Arc;

use thiserror::Error;

use invoicechain_core::{Address, ExpectedVersion};
use invoicechain_fhe::EncryptedHandle;
use invoicechain_invoicing::{InvoiceId, InvoiceRecord};

use crate::config::StorageConfig;

/// Offset/limit window over an append-only index list.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub const DEFAULT_LIMIT: usize = 100;

    pub const fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Cap `limit` at `max`.
    pub fn clamp(self, max: usize) -> Self {
        Self {
            offset: self.offset,
            limit: self.limit.min(max),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_LIMIT)
    }
}

/// An invoice snapshot to persist, guarded by the version it was decided on.
///
/// `ExpectedVersion::Exact(0)` means "new invoice": the record id must equal the
/// current count, and the id is appended to the sender/recipient indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceWrite {
    pub record: InvoiceRecord,
    pub expected: ExpectedVersion,
}

/// One atomic unit of state change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub invoice: Option<InvoiceWrite>,
    pub balances: Vec<(Address, EncryptedHandle)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invoice(mut self, record: InvoiceRecord, expected: ExpectedVersion) -> Self {
        self.invoice = Some(InvoiceWrite { record, expected });
        self
    }

    pub fn with_balance(mut self, account: Address, balance: EncryptedHandle) -> Self {
        self.balances.push((account, balance));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.invoice.is_none() && self.balances.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

/// Current-state store for one registry instance.
pub trait InvoiceRepository: Send + Sync {
    fn load_invoice(&self, id: InvoiceId) -> Result<Option<InvoiceRecord>, RepositoryError>;

    fn invoice_count(&self) -> Result<u64, RepositoryError>;

    /// Ids created by `account`, in creation order. Unknown accounts yield `[]`.
    fn sent_invoices(
        &self,
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RepositoryError>;

    /// Ids addressed to `account`, in creation order. Unknown accounts yield `[]`.
    fn received_invoices(
        &self,
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RepositoryError>;

    fn balance(&self, account: Address) -> Result<Option<EncryptedHandle>, RepositoryError>;

    /// Apply `changes` atomically. On error nothing is written.
    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError>;
}

impl<R> InvoiceRepository for Arc<R>
where
    R: InvoiceRepository + ?Sized,
{
    fn load_invoice(&self, id: InvoiceId) -> Result<Option<InvoiceRecord>, RepositoryError> {
        (**self).load_invoice(id)
    }

    fn invoice_count(&self) -> Result<u64, RepositoryError> {
        (**self).invoice_count()
    }

    fn sent_invoices(
        &self,
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RepositoryError> {
        (**self).sent_invoices(account, page)
    }

    fn received_invoices(
        &self,
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RepositoryError> {
        (**self).received_invoices(account, page)
    }

    fn balance(&self, account: Address) -> Result<Option<EncryptedHandle>, RepositoryError> {
        (**self).balance(account)
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        (**self).commit(changes)
    }
}

/// Open the repository described by `storage`.
pub fn open_repository(
    storage: &StorageConfig,
) -> Result<Arc<dyn InvoiceRepository>, RepositoryError> {
    match storage {
        StorageConfig::Memory => Ok(Arc::new(InMemoryInvoiceRepository::new())),
        StorageConfig::Sled { path } => {
            tracing::info!(path = %path.display(), "opening sled ledger store");
            Ok(Arc::new(SledInvoiceRepository::open(path)?))
        }
    }
}

/// Shared write validation. Returns `true` when the write creates a new invoice.
pub(crate) fn check_invoice_write(
    current: Option<&InvoiceRecord>,
    count: u64,
    write: &InvoiceWrite,
) -> Result<bool, RepositoryError> {
    let actual = current.map(|r| r.version).unwrap_or(0);
    if !write.expected.matches(actual) {
        return Err(RepositoryError::Conflict(format!(
            "invoice {} is at version {actual}, expected {:?}",
            write.record.id, write.expected
        )));
    }

    if current.is_some() {
        return Ok(false);
    }

    if write.record.id.value() != count {
        return Err(RepositoryError::Conflict(format!(
            "new invoice id {} does not match next id {count}",
            write.record.id
        )));
    }
    Ok(true)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};

    use invoicechain_core::Address;
    use invoicechain_invoicing::{
        ContractVariant, InvoiceAmount, InvoiceId, InvoiceRecord, InvoiceStatus,
    };

    pub fn record(id: u64, sender: Address, recipient: Address) -> InvoiceRecord {
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        InvoiceRecord {
            id: InvoiceId(id),
            sender,
            recipient,
            amount: InvoiceAmount::Plain(100),
            description: format!("invoice {id}"),
            status: InvoiceStatus::Pending,
            variant: ContractVariant::Plaintext,
            created_at: at,
            updated_at: at,
            due_date: None,
            version: 1,
        }
    }
}
