//! Invoice registry service (one "contract instance").
//!
//! Every mutating entry point runs the same pipeline under a single write lock:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load current state from the repository
//!   ↓
//! 2. Decide + apply on the aggregate (pure)
//!   ↓
//! 3. Sequence coprocessor calls (confidential variants only)
//!   ↓
//! 4. Commit one atomic ChangeSet (optimistic version check)
//!   ↓
//! 5. Publish committed events to the bus
//! ```
//!
//! Any failure before step 4 leaves the ledger untouched. Publication happens
//! strictly after commit; a publication failure is reported to the caller, but
//! the state change stands (at-least-once delivery to consumers).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

use invoicechain_core::{Address, AggregateRoot, DomainError, ExpectedVersion, execute};
use invoicechain_events::{Event, EventBus, EventEnvelope};
use invoicechain_fhe::{EncryptedHandle, ExternalCiphertext, FheCoprocessor, FheError, InputProof};
use invoicechain_invoicing::{
    BalanceDeposited, CancelInvoice, ContractVariant, CreateInvoice, DisputeInvoice, Invoice,
    InvoiceAmount, InvoiceCommand, InvoiceId, InvoiceRecord, LedgerEvent, PayInvoice,
    ensure_distinct_parties,
};

use crate::repository::{ChangeSet, InvoiceRepository, Page, RepositoryError};

/// Source of ledger time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("coprocessor error: {0}")]
    Fhe(#[from] FheError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("event serialization failed: {0}")]
    Serialize(String),

    /// State was committed, but publishing to the bus failed.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl RegistryError {
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            RegistryError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Amount as submitted by the creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountInput {
    Plain(u64),
    Encrypted {
        ciphertext: ExternalCiphertext,
        proof: InputProof,
    },
}

/// Arguments of `create_invoice` (the caller is passed separately).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub recipient: Address,
    pub amount: AmountInput,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
}

pub struct InvoiceRegistry<R, B> {
    contract: Address,
    variant: ContractVariant,
    repository: R,
    fhe: Arc<dyn FheCoprocessor>,
    bus: B,
    max_page_size: usize,
    clock: Clock,
    write_lock: Mutex<()>,
}

impl<R, B> core::fmt::Debug for InvoiceRegistry<R, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InvoiceRegistry")
            .field("contract", &self.contract)
            .field("variant", &self.variant)
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

impl<R, B> InvoiceRegistry<R, B> {
    pub fn new(
        contract: Address,
        variant: ContractVariant,
        repository: R,
        fhe: Arc<dyn FheCoprocessor>,
        bus: B,
    ) -> Self {
        Self {
            contract,
            variant,
            repository,
            fhe,
            bus,
            max_page_size: Page::DEFAULT_LIMIT,
            clock: Arc::new(Utc::now),
            write_lock: Mutex::new(()),
        }
    }

    /// Replace the wall clock (tests use a fixed or stepping clock).
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn variant(&self) -> ContractVariant {
        self.variant
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R, B> InvoiceRegistry<R, B>
where
    R: InvoiceRepository,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Create an invoice from `caller` (the sender). Returns the new id.
    pub fn create_invoice(
        &self,
        caller: Address,
        new: NewInvoice,
    ) -> Result<InvoiceId, RegistryError> {
        let _guard = self.lock();
        let now = (self.clock)();

        ensure_distinct_parties(caller, new.recipient)?;
        let amount = self.resolve_amount(caller, new.recipient, new.amount)?;

        let invoice_id = InvoiceId(self.repository.invoice_count()?);
        let mut invoice = Invoice::empty(invoice_id);
        let events = execute(
            &mut invoice,
            &InvoiceCommand::CreateInvoice(CreateInvoice {
                invoice_id,
                variant: self.variant,
                caller,
                recipient: new.recipient,
                amount,
                description: new.description,
                due_date: new.due_date,
                occurred_at: now,
            }),
        )?;

        let changes = ChangeSet::new().with_invoice(snapshot(&invoice)?, ExpectedVersion::Exact(0));
        self.repository.commit(changes)?;
        info!(
            invoice_id = %invoice_id,
            sender = %caller,
            recipient = %new.recipient,
            variant = %self.variant,
            "invoice created"
        );

        self.publish(&events)?;
        Ok(invoice_id)
    }

    /// Pay a pending invoice (recipient only).
    ///
    /// In the balance-ledger variant this also moves the encrypted amount from
    /// the recipient's balance to the sender's. The move is computed entirely
    /// on encrypted values: with an insufficient balance the call still
    /// succeeds and transfers an encrypted zero.
    pub fn pay_invoice(&self, caller: Address, invoice_id: InvoiceId) -> Result<(), RegistryError> {
        let _guard = self.lock();
        let now = (self.clock)();

        let mut invoice = self.load(invoice_id)?;
        let expected = ExpectedVersion::Exact(invoice.version());
        let events = execute(
            &mut invoice,
            &InvoiceCommand::PayInvoice(PayInvoice {
                invoice_id,
                caller,
                occurred_at: now,
            }),
        )?;

        let mut changes = ChangeSet::new();
        if invoice.variant().is_some_and(ContractVariant::has_balance_ledger) {
            changes = self.settle(&invoice, changes)?;
        }
        self.repository
            .commit(changes.with_invoice(snapshot(&invoice)?, expected))?;
        info!(invoice_id = %invoice_id, caller = %caller, "invoice paid");

        self.publish(&events)?;
        Ok(())
    }

    /// Cancel a pending invoice (sender only).
    pub fn cancel_invoice(
        &self,
        caller: Address,
        invoice_id: InvoiceId,
    ) -> Result<(), RegistryError> {
        let _guard = self.lock();
        let now = (self.clock)();

        let mut invoice = self.load(invoice_id)?;
        let expected = ExpectedVersion::Exact(invoice.version());
        let events = execute(
            &mut invoice,
            &InvoiceCommand::CancelInvoice(CancelInvoice {
                invoice_id,
                caller,
                occurred_at: now,
            }),
        )?;

        self.repository
            .commit(ChangeSet::new().with_invoice(snapshot(&invoice)?, expected))?;
        info!(invoice_id = %invoice_id, caller = %caller, "invoice cancelled");

        self.publish(&events)?;
        Ok(())
    }

    /// Dispute a pending invoice (recipient only; not offered by every variant).
    pub fn dispute_invoice(
        &self,
        caller: Address,
        invoice_id: InvoiceId,
    ) -> Result<(), RegistryError> {
        if !self.variant.supports_dispute() {
            return Err(DomainError::unsupported(format!(
                "the {} variant has no disputes",
                self.variant
            ))
            .into());
        }

        let _guard = self.lock();
        let now = (self.clock)();

        let mut invoice = self.load(invoice_id)?;
        let expected = ExpectedVersion::Exact(invoice.version());
        let events = execute(
            &mut invoice,
            &InvoiceCommand::DisputeInvoice(DisputeInvoice {
                invoice_id,
                caller,
                occurred_at: now,
            }),
        )?;

        self.repository
            .commit(ChangeSet::new().with_invoice(snapshot(&invoice)?, expected))?;
        info!(invoice_id = %invoice_id, caller = %caller, "invoice disputed");

        self.publish(&events)?;
        Ok(())
    }

    /// Add an encrypted amount to the caller's balance. Returns the new balance handle.
    pub fn deposit(
        &self,
        caller: Address,
        ciphertext: &ExternalCiphertext,
        proof: &InputProof,
    ) -> Result<EncryptedHandle, RegistryError> {
        self.ensure_balance_ledger()?;

        let _guard = self.lock();
        let now = (self.clock)();

        let amount = self
            .fhe
            .from_external(ciphertext, proof, self.contract, caller)?;
        let current = self.balance_or_zero(caller)?;
        let next = self.fhe.add(&current, &amount)?;
        self.grant(&next, caller)?;

        self.repository
            .commit(ChangeSet::new().with_balance(caller, next))?;
        info!(account = %caller, "balance deposited");

        self.publish(&[LedgerEvent::BalanceDeposited(BalanceDeposited {
            account: caller,
            balance: next,
            occurred_at: now,
        })])?;
        Ok(next)
    }

    pub fn get_invoice(&self, invoice_id: InvoiceId) -> Result<InvoiceRecord, RegistryError> {
        self.repository
            .load_invoice(invoice_id)?
            .ok_or_else(|| DomainError::not_found().into())
    }

    pub fn invoice_count(&self) -> Result<u64, RegistryError> {
        Ok(self.repository.invoice_count()?)
    }

    pub fn sent_invoices(
        &self,
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RegistryError> {
        Ok(self
            .repository
            .sent_invoices(account, page.clamp(self.max_page_size))?)
    }

    pub fn received_invoices(
        &self,
        account: Address,
        page: Page,
    ) -> Result<Vec<InvoiceId>, RegistryError> {
        Ok(self
            .repository
            .received_invoices(account, page.clamp(self.max_page_size))?)
    }

    /// Encrypted amount handle of an invoice, for one of its two parties.
    pub fn encrypted_amount(
        &self,
        caller: Address,
        invoice_id: InvoiceId,
    ) -> Result<EncryptedHandle, RegistryError> {
        if !self.variant.is_confidential() {
            return Err(
                DomainError::unsupported("plaintext invoices have no encrypted amount").into(),
            );
        }

        let record = self.get_invoice(invoice_id)?;
        if caller != record.sender && caller != record.recipient {
            return Err(DomainError::Unauthorized.into());
        }

        record
            .amount
            .as_handle()
            .copied()
            .ok_or_else(|| DomainError::validation("invoice amount is not encrypted").into())
    }

    /// Encrypted balance handle of `owner`; only the owner may read it.
    pub fn encrypted_balance(
        &self,
        caller: Address,
        owner: Address,
    ) -> Result<Option<EncryptedHandle>, RegistryError> {
        self.ensure_balance_ledger()?;
        if caller != owner {
            return Err(DomainError::Unauthorized.into());
        }
        Ok(self.repository.balance(owner)?)
    }

    fn ensure_balance_ledger(&self) -> Result<(), RegistryError> {
        if !self.variant.has_balance_ledger() {
            return Err(DomainError::unsupported(format!(
                "the {} variant has no balance ledger",
                self.variant
            ))
            .into());
        }
        Ok(())
    }

    fn load(&self, invoice_id: InvoiceId) -> Result<Invoice, RegistryError> {
        Ok(self
            .repository
            .load_invoice(invoice_id)?
            .map(Invoice::from_record)
            .unwrap_or_else(|| Invoice::empty(invoice_id)))
    }

    fn resolve_amount(
        &self,
        sender: Address,
        recipient: Address,
        input: AmountInput,
    ) -> Result<InvoiceAmount, RegistryError> {
        match (self.variant.is_confidential(), input) {
            (false, AmountInput::Plain(value)) => Ok(InvoiceAmount::Plain(value)),
            (true, AmountInput::Encrypted { ciphertext, proof }) => {
                let handle = self
                    .fhe
                    .from_external(&ciphertext, &proof, self.contract, sender)?;
                self.grant(&handle, sender)?;
                self.fhe.allow(&handle, recipient)?;
                debug!(%handle, %sender, %recipient, "accepted encrypted invoice amount");
                Ok(InvoiceAmount::Encrypted(handle))
            }
            (true, AmountInput::Plain(_)) => Err(DomainError::validation(format!(
                "the {} variant requires an encrypted amount",
                self.variant
            ))
            .into()),
            (false, AmountInput::Encrypted { .. }) => Err(DomainError::validation(
                "the plaintext variant requires a plaintext amount",
            )
            .into()),
        }
    }

    /// Encrypted transfer of the invoice amount, recipient → sender.
    ///
    /// The same sequence of coprocessor calls runs whatever the balances are.
    fn settle(&self, invoice: &Invoice, changes: ChangeSet) -> Result<ChangeSet, RegistryError> {
        let amount = invoice
            .amount()
            .and_then(InvoiceAmount::as_handle)
            .copied()
            .ok_or_else(|| DomainError::validation("invoice amount is not encrypted"))?;
        let payer = invoice.recipient();
        let payee = invoice.sender();

        let payer_balance = self.balance_or_zero(payer)?;
        let payee_balance = self.balance_or_zero(payee)?;
        let zero = self.fhe.trivial_encrypt(0)?;

        let sufficient = self.fhe.ge(&payer_balance, &amount)?;
        let moved = self.fhe.select(&sufficient, &amount, &zero)?;
        let payer_next = self.fhe.sub(&payer_balance, &moved)?;
        let payee_next = self.fhe.add(&payee_balance, &moved)?;

        self.grant(&payer_next, payer)?;
        self.grant(&payee_next, payee)?;
        debug!(invoice_id = %invoice.id(), %payer, %payee, "sequenced encrypted settlement");

        Ok(changes
            .with_balance(payer, payer_next)
            .with_balance(payee, payee_next))
    }

    fn balance_or_zero(&self, account: Address) -> Result<EncryptedHandle, RegistryError> {
        match self.repository.balance(account)? {
            Some(handle) => Ok(handle),
            None => {
                let zero = self.fhe.trivial_encrypt(0)?;
                self.fhe.allow_this(&zero, self.contract)?;
                Ok(zero)
            }
        }
    }

    /// Registry keeps access to `handle`; `account` may decrypt it.
    fn grant(&self, handle: &EncryptedHandle, account: Address) -> Result<(), RegistryError> {
        self.fhe.allow_this(handle, self.contract)?;
        self.fhe.allow(handle, account)?;
        Ok(())
    }

    fn publish<E>(&self, events: &[E]) -> Result<(), RegistryError>
    where
        E: Event + Serialize,
    {
        for ev in events {
            let envelope = EventEnvelope::from_typed(self.contract, ev)
                .map_err(|e| RegistryError::Serialize(e.to_string()))?;
            self.bus
                .publish(envelope)
                .map_err(|e| RegistryError::Publish(format!("{e:?}")))?;
        }
        Ok(())
    }
}

fn snapshot(invoice: &Invoice) -> Result<InvoiceRecord, RegistryError> {
    invoice
        .to_record()
        .ok_or_else(|| DomainError::validation("invoice has no persisted form").into())
}
