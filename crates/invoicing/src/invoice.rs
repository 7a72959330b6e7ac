use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use invoicechain_core::{Address, Aggregate, AggregateRoot, DomainError};
use invoicechain_events::Event;
use invoicechain_fhe::EncryptedHandle;

use crate::ContractVariant;

/// Due-date offset applied by the plaintext variant when none is supplied.
pub const DEFAULT_DUE_PERIOD_DAYS: i64 = 30;

/// Sequential invoice identifier (0, 1, 2, ...). Never reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub u64);

impl InvoiceId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice status lifecycle. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Cancelled,
    Disputed,
}

impl InvoiceStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, InvoiceStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Disputed => "disputed",
        }
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoice amount: plaintext smallest-unit integer or an opaque encrypted handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum InvoiceAmount {
    Plain(u64),
    Encrypted(EncryptedHandle),
}

impl InvoiceAmount {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, InvoiceAmount::Encrypted(_))
    }

    pub fn as_plain(&self) -> Option<u64> {
        match self {
            InvoiceAmount::Plain(v) => Some(*v),
            InvoiceAmount::Encrypted(_) => None,
        }
    }

    pub fn as_handle(&self) -> Option<&EncryptedHandle> {
        match self {
            InvoiceAmount::Plain(_) => None,
            InvoiceAmount::Encrypted(h) => Some(h),
        }
    }
}

/// Persisted/queryable snapshot of an existing invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: InvoiceId,
    pub sender: Address,
    pub recipient: Address,
    pub amount: InvoiceAmount,
    pub description: String,
    pub status: InvoiceStatus,
    pub variant: ContractVariant,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub version: u64,
}

/// Aggregate root: Invoice.
///
/// An invoice exists iff its sender is non-zero; `Invoice::empty` has a zero
/// sender and stands for "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    sender: Address,
    recipient: Address,
    amount: Option<InvoiceAmount>,
    description: String,
    status: InvoiceStatus,
    variant: Option<ContractVariant>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    version: u64,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            sender: Address::ZERO,
            recipient: Address::ZERO,
            amount: None,
            description: String::new(),
            status: InvoiceStatus::Pending,
            variant: None,
            created_at: None,
            updated_at: None,
            due_date: None,
            version: 0,
        }
    }

    /// Rehydrate from a persisted snapshot.
    pub fn from_record(record: InvoiceRecord) -> Self {
        Self {
            id: record.id,
            sender: record.sender,
            recipient: record.recipient,
            amount: Some(record.amount),
            description: record.description,
            status: record.status,
            variant: Some(record.variant),
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
            due_date: record.due_date,
            version: record.version,
        }
    }

    /// Snapshot for persistence; `None` while the invoice does not exist.
    pub fn to_record(&self) -> Option<InvoiceRecord> {
        if !self.exists() {
            return None;
        }
        Some(InvoiceRecord {
            id: self.id,
            sender: self.sender,
            recipient: self.recipient,
            amount: self.amount?,
            description: self.description.clone(),
            status: self.status,
            variant: self.variant?,
            created_at: self.created_at?,
            updated_at: self.updated_at?,
            due_date: self.due_date,
            version: self.version,
        })
    }

    pub fn exists(&self) -> bool {
        !self.sender.is_zero()
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn recipient(&self) -> Address {
        self.recipient
    }

    pub fn amount(&self) -> Option<&InvoiceAmount> {
        self.amount.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn variant(&self) -> Option<ContractVariant> {
        self.variant
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    /// Whether `account` is one of the two parties.
    pub fn is_party(&self, account: Address) -> bool {
        self.exists() && (account == self.sender || account == self.recipient)
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateInvoice. `caller` becomes the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub invoice_id: InvoiceId,
    pub variant: ContractVariant,
    pub caller: Address,
    pub recipient: Address,
    pub amount: InvoiceAmount,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PayInvoice (recipient only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayInvoice {
    pub invoice_id: InvoiceId,
    pub caller: Address,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelInvoice (sender only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub invoice_id: InvoiceId,
    pub caller: Address,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DisputeInvoice (recipient only, variants with disputes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeInvoice {
    pub invoice_id: InvoiceId,
    pub caller: Address,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    CreateInvoice(CreateInvoice),
    PayInvoice(PayInvoice),
    CancelInvoice(CancelInvoice),
    DisputeInvoice(DisputeInvoice),
}

/// Event: InvoiceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub sender: Address,
    pub recipient: Address,
    pub amount: InvoiceAmount,
    pub description: String,
    pub variant: ContractVariant,
    pub due_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicePaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaid {
    pub invoice_id: InvoiceId,
    pub payer: Address,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub invoice_id: InvoiceId,
    pub sender: Address,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceDisputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDisputed {
    pub invoice_id: InvoiceId,
    pub recipient: Address,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceCreated(InvoiceCreated),
    InvoicePaid(InvoicePaid),
    InvoiceCancelled(InvoiceCancelled),
    InvoiceDisputed(InvoiceDisputed),
}

impl InvoiceEvent {
    pub fn invoice_id(&self) -> InvoiceId {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.invoice_id,
            InvoiceEvent::InvoicePaid(e) => e.invoice_id,
            InvoiceEvent::InvoiceCancelled(e) => e.invoice_id,
            InvoiceEvent::InvoiceDisputed(e) => e.invoice_id,
        }
    }
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceCreated(_) => "invoicing.invoice.created",
            InvoiceEvent::InvoicePaid(_) => "invoicing.invoice.paid",
            InvoiceEvent::InvoiceCancelled(_) => "invoicing.invoice.cancelled",
            InvoiceEvent::InvoiceDisputed(_) => "invoicing.invoice.disputed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.occurred_at,
            InvoiceEvent::InvoicePaid(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
            InvoiceEvent::InvoiceDisputed(e) => e.occurred_at,
        }
    }

    fn stream(&self) -> String {
        format!("invoice/{}", self.invoice_id())
    }
}

/// Recipient must be a real account other than the sender.
pub fn ensure_distinct_parties(sender: Address, recipient: Address) -> Result<(), DomainError> {
    if recipient.is_zero() || recipient == sender {
        return Err(DomainError::InvalidRecipient);
    }
    Ok(())
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceCreated(e) => {
                self.id = e.invoice_id;
                self.sender = e.sender;
                self.recipient = e.recipient;
                self.amount = Some(e.amount);
                self.description = e.description.clone();
                self.status = InvoiceStatus::Pending;
                self.variant = Some(e.variant);
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.due_date = e.due_date;
            }
            InvoiceEvent::InvoicePaid(e) => {
                self.status = InvoiceStatus::Paid;
                self.updated_at = Some(e.occurred_at);
            }
            InvoiceEvent::InvoiceCancelled(e) => {
                self.status = InvoiceStatus::Cancelled;
                self.updated_at = Some(e.occurred_at);
            }
            InvoiceEvent::InvoiceDisputed(e) => {
                self.status = InvoiceStatus::Disputed;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::CreateInvoice(cmd) => self.handle_create(cmd),
            InvoiceCommand::PayInvoice(cmd) => self.handle_pay(cmd),
            InvoiceCommand::CancelInvoice(cmd) => self.handle_cancel(cmd),
            InvoiceCommand::DisputeInvoice(cmd) => self.handle_dispute(cmd),
        }
    }
}

impl Invoice {
    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::validation("invoice_id mismatch"));
        }
        Ok(())
    }

    /// Existence first, then lifecycle state: a terminal invoice rejects every
    /// transition with `InvalidStatus` no matter who asks.
    fn ensure_pending(&self, invoice_id: InvoiceId, action: &str) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found());
        }
        self.ensure_invoice_id(invoice_id)?;
        if self.status != InvoiceStatus::Pending {
            return Err(DomainError::invalid_status(format!(
                "cannot {action} invoice {} in status {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.exists() {
            return Err(DomainError::conflict("invoice already exists"));
        }
        self.ensure_invoice_id(cmd.invoice_id)?;

        ensure_distinct_parties(cmd.caller, cmd.recipient)?;

        if cmd.amount.is_encrypted() != cmd.variant.is_confidential() {
            return Err(DomainError::validation(format!(
                "amount kind does not match the {} variant",
                cmd.variant
            )));
        }

        if cmd.amount.as_plain() == Some(0) {
            return Err(DomainError::InvalidAmount);
        }

        let due_date = match cmd.variant {
            ContractVariant::Plaintext => Some(
                cmd.due_date
                    .unwrap_or(cmd.occurred_at + Duration::days(DEFAULT_DUE_PERIOD_DAYS)),
            ),
            _ => cmd.due_date,
        };

        Ok(vec![InvoiceEvent::InvoiceCreated(InvoiceCreated {
            invoice_id: cmd.invoice_id,
            sender: cmd.caller,
            recipient: cmd.recipient,
            amount: cmd.amount,
            description: cmd.description.clone(),
            variant: cmd.variant,
            due_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_pay(&self, cmd: &PayInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_pending(cmd.invoice_id, "pay")?;
        if cmd.caller != self.recipient {
            return Err(DomainError::Unauthorized);
        }

        Ok(vec![InvoiceEvent::InvoicePaid(InvoicePaid {
            invoice_id: cmd.invoice_id,
            payer: cmd.caller,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_pending(cmd.invoice_id, "cancel")?;
        if cmd.caller != self.sender {
            return Err(DomainError::Unauthorized);
        }

        Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            invoice_id: cmd.invoice_id,
            sender: cmd.caller,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_dispute(&self, cmd: &DisputeInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if let Some(variant) = self.variant {
            if !variant.supports_dispute() {
                return Err(DomainError::unsupported(format!(
                    "the {variant} variant has no disputes"
                )));
            }
        }
        self.ensure_pending(cmd.invoice_id, "dispute")?;
        if cmd.caller != self.recipient {
            return Err(DomainError::Unauthorized);
        }

        Ok(vec![InvoiceEvent::InvoiceDisputed(InvoiceDisputed {
            invoice_id: cmd.invoice_id,
            recipient: cmd.caller,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoicechain_core::execute;
    use proptest::prelude::*;

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn bob() -> Address {
        Address::repeat_byte(0xb0)
    }

    fn carol() -> Address {
        Address::repeat_byte(0xc4)
    }

    fn test_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn create_cmd(variant: ContractVariant, amount: InvoiceAmount) -> CreateInvoice {
        CreateInvoice {
            invoice_id: InvoiceId(0),
            variant,
            caller: alice(),
            recipient: bob(),
            amount,
            description: "rent".to_string(),
            due_date: None,
            occurred_at: test_time(),
        }
    }

    fn created(variant: ContractVariant) -> Invoice {
        let amount = if variant.is_confidential() {
            InvoiceAmount::Encrypted(EncryptedHandle::from_bytes([1; 32]))
        } else {
            InvoiceAmount::Plain(100)
        };
        let mut invoice = Invoice::empty(InvoiceId(0));
        execute(
            &mut invoice,
            &InvoiceCommand::CreateInvoice(create_cmd(variant, amount)),
        )
        .unwrap();
        invoice
    }

    fn pay(caller: Address) -> InvoiceCommand {
        InvoiceCommand::PayInvoice(PayInvoice {
            invoice_id: InvoiceId(0),
            caller,
            occurred_at: test_time(),
        })
    }

    fn cancel(caller: Address) -> InvoiceCommand {
        InvoiceCommand::CancelInvoice(CancelInvoice {
            invoice_id: InvoiceId(0),
            caller,
            occurred_at: test_time(),
        })
    }

    fn dispute(caller: Address) -> InvoiceCommand {
        InvoiceCommand::DisputeInvoice(DisputeInvoice {
            invoice_id: InvoiceId(0),
            caller,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn create_emits_invoice_created_and_starts_pending() {
        let invoice = Invoice::empty(InvoiceId(0));
        let cmd = create_cmd(ContractVariant::Plaintext, InvoiceAmount::Plain(100));

        let events = invoice
            .handle(&InvoiceCommand::CreateInvoice(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            InvoiceEvent::InvoiceCreated(e) => {
                assert_eq!(e.sender, alice());
                assert_eq!(e.recipient, bob());
                assert_eq!(e.amount, InvoiceAmount::Plain(100));
                assert_eq!(e.description, "rent");
            }
            _ => panic!("Expected InvoiceCreated event"),
        }

        let invoice = created(ContractVariant::Plaintext);
        assert!(invoice.exists());
        assert_eq!(invoice.status(), InvoiceStatus::Pending);
        assert_eq!(invoice.version(), 1);
        assert_eq!(invoice.created_at(), Some(test_time()));
        assert_eq!(invoice.updated_at(), Some(test_time()));
    }

    #[test]
    fn plaintext_due_date_defaults_to_thirty_days() {
        let invoice = created(ContractVariant::Plaintext);
        assert_eq!(
            invoice.due_date(),
            Some(test_time() + Duration::days(DEFAULT_DUE_PERIOD_DAYS))
        );
    }

    #[test]
    fn explicit_due_date_is_kept() {
        let due = test_time() + Duration::days(3);
        let mut cmd = create_cmd(ContractVariant::Plaintext, InvoiceAmount::Plain(5));
        cmd.due_date = Some(due);
        let mut invoice = Invoice::empty(InvoiceId(0));
        execute(&mut invoice, &InvoiceCommand::CreateInvoice(cmd)).unwrap();
        assert_eq!(invoice.due_date(), Some(due));
    }

    #[test]
    fn confidential_variants_do_not_default_due_date() {
        let invoice = created(ContractVariant::ConfidentialDirect);
        assert_eq!(invoice.due_date(), None);
    }

    #[test]
    fn zero_or_self_recipient_is_rejected() {
        let invoice = Invoice::empty(InvoiceId(0));

        let mut cmd = create_cmd(ContractVariant::Plaintext, InvoiceAmount::Plain(1));
        cmd.recipient = Address::ZERO;
        assert_eq!(
            invoice.handle(&InvoiceCommand::CreateInvoice(cmd)).unwrap_err(),
            DomainError::InvalidRecipient
        );

        let mut cmd = create_cmd(ContractVariant::Plaintext, InvoiceAmount::Plain(1));
        cmd.recipient = alice();
        assert_eq!(
            invoice.handle(&InvoiceCommand::CreateInvoice(cmd)).unwrap_err(),
            DomainError::InvalidRecipient
        );
    }

    #[test]
    fn zero_plaintext_amount_is_rejected() {
        let invoice = Invoice::empty(InvoiceId(0));
        let cmd = create_cmd(ContractVariant::Plaintext, InvoiceAmount::Plain(0));
        assert_eq!(
            invoice.handle(&InvoiceCommand::CreateInvoice(cmd)).unwrap_err(),
            DomainError::InvalidAmount
        );
    }

    #[test]
    fn amount_kind_must_match_variant() {
        let invoice = Invoice::empty(InvoiceId(0));
        let cmd = create_cmd(ContractVariant::ConfidentialBalance, InvoiceAmount::Plain(10));
        assert!(matches!(
            invoice.handle(&InvoiceCommand::CreateInvoice(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_create_conflicts() {
        let invoice = created(ContractVariant::Plaintext);
        let cmd = create_cmd(ContractVariant::Plaintext, InvoiceAmount::Plain(100));
        assert!(matches!(
            invoice.handle(&InvoiceCommand::CreateInvoice(cmd)),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn transitions_on_missing_invoice_are_not_found() {
        let invoice = Invoice::empty(InvoiceId(0));
        for cmd in [pay(bob()), cancel(alice()), dispute(bob())] {
            assert_eq!(invoice.handle(&cmd).unwrap_err(), DomainError::NotFound);
        }
    }

    #[test]
    fn recipient_pays() {
        let mut invoice = created(ContractVariant::Plaintext);
        execute(&mut invoice, &pay(bob())).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert_eq!(invoice.version(), 2);
    }

    #[test]
    fn only_recipient_pays_or_disputes_and_only_sender_cancels() {
        let invoice = created(ContractVariant::Plaintext);
        assert_eq!(invoice.handle(&pay(alice())).unwrap_err(), DomainError::Unauthorized);
        assert_eq!(invoice.handle(&pay(carol())).unwrap_err(), DomainError::Unauthorized);
        assert_eq!(invoice.handle(&dispute(alice())).unwrap_err(), DomainError::Unauthorized);
        assert_eq!(invoice.handle(&cancel(bob())).unwrap_err(), DomainError::Unauthorized);
        assert_eq!(invoice.handle(&cancel(carol())).unwrap_err(), DomainError::Unauthorized);
    }

    #[test]
    fn paying_twice_is_invalid_status_even_for_sender() {
        let mut invoice = created(ContractVariant::Plaintext);
        execute(&mut invoice, &pay(bob())).unwrap();

        assert!(matches!(
            invoice.handle(&pay(alice())),
            Err(DomainError::InvalidStatus(_))
        ));
        assert!(matches!(
            invoice.handle(&cancel(alice())),
            Err(DomainError::InvalidStatus(_))
        ));
    }

    #[test]
    fn balance_variant_has_no_disputes() {
        let invoice = created(ContractVariant::ConfidentialBalance);
        assert!(matches!(
            invoice.handle(&dispute(bob())),
            Err(DomainError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn record_snapshot_rehydrates_identically() {
        let mut invoice = created(ContractVariant::ConfidentialDirect);
        execute(&mut invoice, &dispute(bob())).unwrap();

        let record = invoice.to_record().unwrap();
        assert_eq!(record.status, InvoiceStatus::Disputed);
        assert_eq!(Invoice::from_record(record), invoice);
        assert!(Invoice::empty(InvoiceId(3)).to_record().is_none());
    }

    #[test]
    fn amount_serializes_with_kind_tag() {
        let json = serde_json::to_value(InvoiceAmount::Plain(42)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "plain", "value": 42}));
    }

    fn terminal_transition() -> impl Strategy<Value = usize> {
        0usize..3
    }

    fn any_caller() -> impl Strategy<Value = Address> {
        prop_oneof![Just(alice()), Just(bob()), Just(carol())]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: once terminal, every transition by every caller is InvalidStatus.
        #[test]
        fn terminal_states_reject_every_transition(
            first in terminal_transition(),
            caller in any_caller(),
            next in 0usize..3,
        ) {
            let mut invoice = created(ContractVariant::Plaintext);
            let to_terminal = [pay(bob()), cancel(alice()), dispute(bob())];
            execute(&mut invoice, &to_terminal[first]).unwrap();
            prop_assert!(invoice.status().is_terminal());

            let attempts = [pay(caller), cancel(caller), dispute(caller)];
            let err = invoice.handle(&attempts[next]).unwrap_err();
            prop_assert!(matches!(err, DomainError::InvalidStatus(_)));
            prop_assert_eq!(invoice.version(), 2);
        }

        /// Property: any non-zero plaintext amount to a distinct recipient is accepted.
        #[test]
        fn valid_plaintext_creations_are_accepted(amount in 1u64..u64::MAX, tag in 1u8..255) {
            let recipient = Address::repeat_byte(tag);
            prop_assume!(recipient != alice());
            let mut cmd = create_cmd(ContractVariant::Plaintext, InvoiceAmount::Plain(amount));
            cmd.recipient = recipient;
            let invoice = Invoice::empty(InvoiceId(0));
            let events = invoice.handle(&InvoiceCommand::CreateInvoice(cmd)).unwrap();
            prop_assert_eq!(events.len(), 1);
        }
    }
}
