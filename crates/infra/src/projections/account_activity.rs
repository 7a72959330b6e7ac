//! Per-account activity projection.
//!
//! Counts what each address has done on a registry: invoices sent and
//! received, payments made and collected, cancellations, disputes and
//! deposits. Built from published envelopes, so it can be dropped and
//! rebuilt at any time. Amounts never appear here.
//!
//! Transitions name only the invoice id. Parties come from the `created`
//! envelope when this instance saw it, otherwise from the invoice source
//! (the registry's repository), which covers invoices created before a
//! restart.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use invoicechain_core::Address;
use invoicechain_events::EventEnvelope;
use invoicechain_invoicing::{InvoiceEvent, InvoiceId, LedgerEvent};

use crate::read_model::ReadModelStore;
use crate::repository::InvoiceRepository;

/// How many recent event ids are remembered for redelivery checks.
pub const DEFAULT_DEDUP_WINDOW: usize = 65_536;

/// Read model: activity counters for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountActivity {
    pub account: Address,
    pub invoices_sent: u64,
    pub invoices_received: u64,
    /// Invoices this account paid as recipient.
    pub invoices_paid: u64,
    /// Invoices this account issued that were paid.
    pub invoices_collected: u64,
    pub invoices_cancelled: u64,
    pub invoices_disputed: u64,
    pub deposits: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

impl AccountActivity {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            invoices_sent: 0,
            invoices_received: 0,
            invoices_paid: 0,
            invoices_collected: 0,
            invoices_cancelled: 0,
            invoices_disputed: 0,
            deposits: 0,
            last_activity: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ActivityProjectionError {
    #[error("failed to deserialize {event_type} payload: {message}")]
    Deserialize { event_type: String, message: String },

    #[error("transition for unknown invoice {0}")]
    UnknownInvoice(InvoiceId),

    #[error("invoice lookup failed: {0}")]
    Lookup(String),
}

#[derive(Debug, Default)]
struct Bookkeeping {
    seen: HashSet<Uuid>,
    /// Insertion order of `seen`, oldest first.
    seen_order: VecDeque<Uuid>,
    parties: HashMap<InvoiceId, (Address, Address)>,
}

impl Bookkeeping {
    fn remember(&mut self, event_id: Uuid, window: usize) {
        if !self.seen.insert(event_id) {
            return;
        }
        self.seen_order.push_back(event_id);
        while self.seen_order.len() > window {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }
}

/// Idempotent per `event_id` within the last `dedup_window` envelopes:
/// redelivered envelopes are ignored.
pub struct AccountActivityProjection<S>
where
    S: ReadModelStore<Address, AccountActivity>,
{
    store: S,
    registry: Option<Address>,
    invoices: Option<Arc<dyn InvoiceRepository>>,
    dedup_window: usize,
    book: RwLock<Bookkeeping>,
}

impl<S> core::fmt::Debug for AccountActivityProjection<S>
where
    S: ReadModelStore<Address, AccountActivity>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountActivityProjection")
            .field("registry", &self.registry)
            .field("has_invoice_source", &self.invoices.is_some())
            .field("dedup_window", &self.dedup_window)
            .finish_non_exhaustive()
    }
}

impl<S> AccountActivityProjection<S>
where
    S: ReadModelStore<Address, AccountActivity>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            registry: None,
            invoices: None,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            book: RwLock::new(Bookkeeping::default()),
        }
    }

    /// Resolve parties of invoices whose `created` envelope this instance never saw.
    pub fn with_invoice_source(mut self, invoices: Arc<dyn InvoiceRepository>) -> Self {
        self.invoices = Some(invoices);
        self
    }

    pub fn with_dedup_window(mut self, window: usize) -> Self {
        self.dedup_window = window.max(1);
        self
    }

    /// Only accept envelopes emitted by `registry`.
    pub fn for_registry(mut self, registry: Address) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn get(&self, account: Address) -> Option<AccountActivity> {
        self.store.get(&account)
    }

    pub fn list(&self) -> Vec<AccountActivity> {
        self.store.list()
    }

    /// Forget everything (before a replay).
    pub fn reset(&self) {
        self.store.clear();
        if let Ok(mut book) = self.book.write() {
            *book = Bookkeeping::default();
        }
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ActivityProjectionError> {
        if let Some(registry) = self.registry {
            if envelope.registry() != registry {
                return Ok(());
            }
        }

        let mut book = match self.book.write() {
            Ok(b) => b,
            Err(poisoned) => poisoned.into_inner(),
        };
        if book.seen.contains(&envelope.event_id()) {
            return Ok(());
        }

        let at = envelope.occurred_at();
        let type_name = envelope.event_type();

        if type_name.starts_with("invoicing.invoice.") {
            let ev: InvoiceEvent = envelope.decode().map_err(|e| deserialize(type_name, e))?;
            self.apply_invoice_event(&mut book, ev, at)?;
        } else if type_name.starts_with("ledger.balance.") {
            let ev: LedgerEvent = envelope.decode().map_err(|e| deserialize(type_name, e))?;
            match ev {
                LedgerEvent::BalanceDeposited(e) => self.touch(e.account, at, |a| a.deposits += 1),
            }
        } else {
            return Ok(());
        }

        book.remember(envelope.event_id(), self.dedup_window);
        Ok(())
    }

    fn apply_invoice_event(
        &self,
        book: &mut Bookkeeping,
        ev: InvoiceEvent,
        at: DateTime<Utc>,
    ) -> Result<(), ActivityProjectionError> {
        if let InvoiceEvent::InvoiceCreated(e) = &ev {
            book.parties.insert(e.invoice_id, (e.sender, e.recipient));
            self.touch(e.sender, at, |a| a.invoices_sent += 1);
            self.touch(e.recipient, at, |a| a.invoices_received += 1);
            return Ok(());
        }

        let invoice_id = ev.invoice_id();
        let (sender, recipient) = self.parties(book, invoice_id)?;

        match ev {
            InvoiceEvent::InvoicePaid(_) => {
                self.touch(recipient, at, |a| a.invoices_paid += 1);
                self.touch(sender, at, |a| a.invoices_collected += 1);
            }
            InvoiceEvent::InvoiceCancelled(_) => {
                self.touch(sender, at, |a| a.invoices_cancelled += 1);
                self.touch(recipient, at, |a| a.invoices_cancelled += 1);
            }
            InvoiceEvent::InvoiceDisputed(_) => {
                self.touch(sender, at, |a| a.invoices_disputed += 1);
                self.touch(recipient, at, |a| a.invoices_disputed += 1);
            }
            InvoiceEvent::InvoiceCreated(_) => {}
        }
        Ok(())
    }

    fn parties(
        &self,
        book: &mut Bookkeeping,
        invoice_id: InvoiceId,
    ) -> Result<(Address, Address), ActivityProjectionError> {
        if let Some(parties) = book.parties.get(&invoice_id) {
            return Ok(*parties);
        }

        let source = self
            .invoices
            .as_ref()
            .ok_or(ActivityProjectionError::UnknownInvoice(invoice_id))?;
        let record = source
            .load_invoice(invoice_id)
            .map_err(|e| ActivityProjectionError::Lookup(e.to_string()))?
            .ok_or(ActivityProjectionError::UnknownInvoice(invoice_id))?;

        let parties = (record.sender, record.recipient);
        book.parties.insert(invoice_id, parties);
        Ok(parties)
    }

    fn touch(&self, account: Address, at: DateTime<Utc>, update: impl FnOnce(&mut AccountActivity)) {
        let mut activity = self
            .store
            .get(&account)
            .unwrap_or_else(|| AccountActivity::new(account));
        update(&mut activity);
        activity.last_activity = Some(activity.last_activity.map_or(at, |prev| prev.max(at)));
        self.store.upsert(account, activity);
    }
}

fn deserialize(event_type: &str, err: serde_json::Error) -> ActivityProjectionError {
    ActivityProjectionError::Deserialize {
        event_type: event_type.to_string(),
        message: err.to_string(),
    }
}
