use chrono::{DateTime, Utc};

/// A ledger event.
///
/// Events are immutable facts, versioned for schema evolution, and only ever
/// appended.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "invoicing.invoice.paid").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Ledger time at which the event was recorded.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Name of the stream the event belongs to (e.g. "invoice/7").
    fn stream(&self) -> String;
}
