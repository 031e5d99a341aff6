//! Event model: the typed `Event` contract and the immutable `EventRecord`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ids::AggregateId;

/// Event は event_type と型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct OrderShipped {
///     carrier: String,
///     shipped_at: DateTime<Utc>,
/// }
///
/// impl Event for OrderShipped {
///     const TYPE: &'static str = "shop.order.shipped.v1";
///
///     fn occurred_on(&self) -> DateTime<Utc> {
///         self.shipped_at
///     }
/// }
/// ```
///
/// `occurred_on` is for consumers (recency, display). Dispatch order is
/// driven by the sequence number, never by wall-clock time.
pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// `{namespace}.{domain}.{action}.v{major}`
    const TYPE: &'static str;

    fn occurred_on(&self) -> DateTime<Utc>;

    /// Explicit idempotency key. When present it replaces the derived
    /// `kind/aggregate#sequence` dedup key.
    fn idempotency_key(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn of<E: Event>() -> Self {
        Self::new(E::TYPE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Key a consumer (or the store) uses to recognise a redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    /// `{kind}/{aggregate_id}#{sequence}`. The kind is part of the key:
    /// `order/1` and `customer/1` are different streams.
    pub fn derived(aggregate_kind: &str, aggregate_id: &AggregateId, sequence: u64) -> Self {
        Self(format!("{aggregate_kind}/{aggregate_id}#{sequence}"))
    }

    pub fn explicit(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One occurrence tied to an aggregate. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    aggregate_id: AggregateId,
    aggregate_kind: String,
    event_type: EventType,
    payload: serde_json::Value,
    occurred_on: DateTime<Utc>,
    sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    idempotency_key: Option<String>,
}

impl EventRecord {
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_kind: impl Into<String>,
        event_type: EventType,
        payload: serde_json::Value,
        occurred_on: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        Self {
            aggregate_id,
            aggregate_kind: aggregate_kind.into(),
            event_type,
            payload,
            occurred_on,
            sequence,
            idempotency_key: None,
        }
    }

    /// Encode a typed event raised by `aggregate_kind/aggregate_id`.
    pub fn encode<E: Event>(
        aggregate_id: AggregateId,
        aggregate_kind: impl Into<String>,
        event: &E,
        sequence: u64,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_value(event)?;
        let mut record = Self::new(
            aggregate_id,
            aggregate_kind,
            EventType::of::<E>(),
            payload,
            event.occurred_on(),
            sequence,
        );
        record.idempotency_key = event.idempotency_key();
        Ok(record)
    }

    /// Decode the payload back into the typed event.
    pub fn decode<E: Event>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    pub fn aggregate_kind(&self) -> &str {
        &self.aggregate_kind
    }

    /// Ordering stream this record belongs to: `(kind, id)`.
    pub fn stream(&self) -> (&str, &AggregateId) {
        (&self.aggregate_kind, &self.aggregate_id)
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn dedup_key(&self) -> DedupKey {
        match &self.idempotency_key {
            Some(key) => DedupKey::explicit(key.clone()),
            None => DedupKey::derived(&self.aggregate_kind, &self.aggregate_id, self.sequence),
        }
    }
}
