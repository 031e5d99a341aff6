//! Consumer port - 配送先
//!
//! Consumers must be idempotent on `Delivery::dedup_key`: the dispatcher is
//! at-least-once and redelivers after a crash between delivery and ack.

use async_trait::async_trait;

use crate::domain::{DedupKey, DeliveryError, EntryId, EventRecord};

/// What a consumer receives for one attempt.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub entry_id: EntryId,
    pub dedup_key: DedupKey,

    /// 1-indexed attempt number of this entry.
    pub attempt: u32,

    pub record: EventRecord,
}

/// Object-safe consumer, stored as `Arc<dyn Consumer>` in `Subscriptions`.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Stable name, unique per event type.
    fn name(&self) -> &str;

    async fn deliver(&self, delivery: &Delivery) -> Result<(), DeliveryError>;
}
