use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use invoicechain_core::Address;
use invoicechain_fhe::EncryptedHandle;
use invoicechain_invoicing::{InvoiceId, InvoiceRecord};

use super::{ChangeSet, InvoiceRepository, Page, RepositoryError, check_invoice_write};

#[derive(Debug, Default)]
struct State {
    invoices: BTreeMap<InvoiceId, InvoiceRecord>,
    sent: HashMap<Address, Vec<InvoiceId>>,
    received: HashMap<Address, Vec<InvoiceId>>,
    balances: HashMap<Address, EncryptedHandle>,
}

/// In-memory repository.
///
/// Intended for tests/dev. State is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceRepository {
    state: RwLock<State>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page_of(ids: Option<&Vec<InvoiceId>>, page: Page) -> Vec<InvoiceId> {
    ids.map(|ids| ids.iter().skip(page.offset).take(page.limit).copied().collect())
        .unwrap_or_default()
}

fn poisoned() -> RepositoryError {
    RepositoryError::Storage("in-memory repository lock poisoned".to_string())
}

impl InvoiceRepository for InMemoryInvoiceRepository {
    fn load_invoice(&self, id: InvoiceId) -> Result<Option<InvoiceRecord>, RepositoryError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.invoices.get(&id).cloned())
    }

    fn invoice_count(&self) -> Result<u64, RepositoryError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.invoices.len() as u64)
    }

    fn sent_invoices(
        &self,
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RepositoryError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(page_of(state.sent.get(&account), page))
    }

    fn received_invoices(
        &self,
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RepositoryError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(page_of(state.received.get(&account), page))
    }

    fn balance(&self, account: Address) -> Result<Option<EncryptedHandle>, RepositoryError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.balances.get(&account).copied())
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;

        // Validate everything before touching state.
        let is_new = match &changes.invoice {
            Some(write) => check_invoice_write(
                state.invoices.get(&write.record.id),
                state.invoices.len() as u64,
                write,
            )?,
            None => false,
        };

        if let Some(write) = changes.invoice {
            let record = write.record;
            if is_new {
                state.sent.entry(record.sender).or_default().push(record.id);
                state
                    .received
                    .entry(record.recipient)
                    .or_default()
                    .push(record.id);
            }
            state.invoices.insert(record.id, record);
        }

        for (account, balance) in changes.balances {
            state.balances.insert(account, balance);
        }

        Ok(())
    }
}
