use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use invoicechain_core::Address;

use crate::Event;

/// Envelope for a published event, carrying registry + stream metadata.
///
/// - `registry` is the address of the registry instance that emitted it.
/// - `event_id` is a UUIDv7, so ids sort by emission time.
/// - `payload` is the serialized domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    registry: Address,
    stream: String,
    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        registry: Address,
        stream: impl Into<String>,
        event_type: impl Into<String>,
        event_version: u32,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            registry,
            stream: stream.into(),
            event_type: event_type.into(),
            event_version,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn registry(&self) -> Address {
        self.registry
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<JsonValue> {
    /// Wrap a typed event into a JSON envelope ready for publication.
    pub fn from_typed<E>(registry: Address, event: &E) -> Result<Self, serde_json::Error>
    where
        E: Event + Serialize,
    {
        Ok(Self::new(
            Uuid::now_v7(),
            registry,
            event.stream(),
            event.event_type(),
            event.version(),
            event.occurred_at(),
            serde_json::to_value(event)?,
        ))
    }

    /// Deserialize the payload back into a typed event.
    pub fn decode<E>(&self) -> Result<E, serde_json::Error>
    where
        E: serde::de::DeserializeOwned,
    {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Pinged {
        n: u64,
        at: DateTime<Utc>,
    }

    impl Event for Pinged {
        fn event_type(&self) -> &'static str {
            "test.pinged"
        }

        fn version(&self) -> u32 {
            3
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }

        fn stream(&self) -> String {
            format!("ping/{}", self.n)
        }
    }

    #[test]
    fn from_typed_copies_event_metadata() {
        let registry = Address::repeat_byte(9);
        let ev = Pinged { n: 4, at: Utc::now() };

        let env = EventEnvelope::from_typed(registry, &ev).unwrap();

        assert_eq!(env.registry(), registry);
        assert_eq!(env.stream(), "ping/4");
        assert_eq!(env.event_type(), "test.pinged");
        assert_eq!(env.event_version(), 3);
        assert_eq!(env.occurred_at(), ev.at);
        assert_eq!(env.decode::<Pinged>().unwrap(), ev);
    }

    #[test]
    fn event_ids_are_unique() {
        let ev = Pinged { n: 1, at: Utc::now() };
        let a = EventEnvelope::from_typed(Address::ZERO, &ev).unwrap();
        let b = EventEnvelope::from_typed(Address::ZERO, &ev).unwrap();
        assert_ne!(a.event_id(), b.event_id());
    }
}
