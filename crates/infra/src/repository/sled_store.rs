//! Persistent repository on sled.
//!
//! Single tree, prefixed keys:
//!
//! ```text
//! meta/count                 -> u64 (big-endian)
//! inv/<id:be64>              -> InvoiceRecord (JSON)
//! sent/<address><id:be64>    -> ()
//! recv/<address><id:be64>    -> ()
//! bal/<address>              -> EncryptedHandle (32 bytes)
//! ```
//!
//! Big-endian ids make prefix scans return index entries in creation order.

use std::path::Path;
use std::sync::Mutex;

use invoicechain_core::Address;
use invoicechain_fhe::EncryptedHandle;
use invoicechain_invoicing::{InvoiceId, InvoiceRecord};

use super::{ChangeSet, InvoiceRepository, Page, RepositoryError, check_invoice_write};

const META_COUNT: &[u8] = b"meta/count";
const INVOICE_PREFIX: &[u8] = b"inv/";
const SENT_PREFIX: &[u8] = b"sent/";
const RECEIVED_PREFIX: &[u8] = b"recv/";
const BALANCE_PREFIX: &[u8] = b"bal/";

fn invoice_key(id: InvoiceId) -> Vec<u8> {
    [INVOICE_PREFIX, &id.value().to_be_bytes()].concat()
}

fn account_prefix(prefix: &[u8], account: Address) -> Vec<u8> {
    [prefix, account.as_bytes()].concat()
}

fn index_key(prefix: &[u8], account: Address, id: InvoiceId) -> Vec<u8> {
    [prefix, account.as_bytes(), &id.value().to_be_bytes()].concat()
}

fn storage(err: sled::Error) -> RepositoryError {
    RepositoryError::Storage(err.to_string())
}

fn decode_u64(bytes: &[u8], what: &str) -> Result<u64, RepositoryError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| RepositoryError::Corrupt(format!("{what}: expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

pub struct SledInvoiceRepository {
    db: sled::Db,
    // Serializes validate-then-apply so two commits never validate against the same state.
    commit_lock: Mutex<()>,
}

impl core::fmt::Debug for SledInvoiceRepository {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SledInvoiceRepository")
            .field("was_recovered", &self.db.was_recovered())
            .finish_non_exhaustive()
    }
}

impl SledInvoiceRepository {
    /// Open (or create) a database directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let db = sled::open(path).map_err(storage)?;
        Ok(Self::from_db(db))
    }

    /// A throwaway database removed on drop.
    pub fn temporary() -> Result<Self, RepositoryError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage)?;
        Ok(Self::from_db(db))
    }

    pub fn from_db(db: sled::Db) -> Self {
        Self {
            db,
            commit_lock: Mutex::new(()),
        }
    }

    fn scan_index(
        &self,
        prefix: &[u8],
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RepositoryError> {
        self.db
            .scan_prefix(account_prefix(prefix, account))
            .keys()
            .skip(page.offset)
            .take(page.limit)
            .map(|key| {
                let key = key.map_err(storage)?;
                let id_bytes = &key[key.len().saturating_sub(8)..];
                Ok(InvoiceId(decode_u64(id_bytes, "index key")?))
            })
            .collect()
    }
}

impl InvoiceRepository for SledInvoiceRepository {
    fn load_invoice(&self, id: InvoiceId) -> Result<Option<InvoiceRecord>, RepositoryError> {
        let Some(bytes) = self.db.get(invoice_key(id)).map_err(storage)? else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&bytes)
            .map_err(|e| RepositoryError::Corrupt(format!("invoice {id}: {e}")))?;
        Ok(Some(record))
    }

    fn invoice_count(&self) -> Result<u64, RepositoryError> {
        match self.db.get(META_COUNT).map_err(storage)? {
            Some(bytes) => decode_u64(&bytes, "invoice count"),
            None => Ok(0),
        }
    }

    fn sent_invoices(
        &self,
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RepositoryError> {
        self.scan_index(SENT_PREFIX, account, page)
    }

    fn received_invoices(
        &self,
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RepositoryError> {
        self.scan_index(RECEIVED_PREFIX, account, page)
    }

    fn balance(&self, account: Address) -> Result<Option<EncryptedHandle>, RepositoryError> {
        let Some(bytes) = self
            .db
            .get(account_prefix(BALANCE_PREFIX, account))
            .map_err(storage)?
        else {
            return Ok(None);
        };
        let handle = EncryptedHandle::from_slice(&bytes)
            .map_err(|e| RepositoryError::Corrupt(format!("balance of {account}: {e}")))?;
        Ok(Some(handle))
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| RepositoryError::Storage("sled commit lock poisoned".to_string()))?;

        let mut batch = sled::Batch::default();

        if let Some(write) = &changes.invoice {
            let current = self.load_invoice(write.record.id)?;
            let count = self.invoice_count()?;
            let is_new = check_invoice_write(current.as_ref(), count, write)?;

            let record = &write.record;
            let bytes = serde_json::to_vec(record)
                .map_err(|e| RepositoryError::Storage(format!("encode invoice {}: {e}", record.id)))?;
            batch.insert(invoice_key(record.id), bytes);

            if is_new {
                batch.insert(META_COUNT, (count + 1).to_be_bytes().to_vec());
                batch.insert(index_key(SENT_PREFIX, record.sender, record.id), Vec::new());
                batch.insert(
                    index_key(RECEIVED_PREFIX, record.recipient, record.id),
                    Vec::new(),
                );
            }
        }

        for (account, balance) in &changes.balances {
            batch.insert(
                account_prefix(BALANCE_PREFIX, *account),
                balance.as_bytes().to_vec(),
            );
        }

        self.db.apply_batch(batch).map_err(storage)?;
        self.db.flush().map_err(storage)?;
        Ok(())
    }
}
