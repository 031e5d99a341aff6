//! Per-session capture buffer.
//!
//! Design:
//! - Append-only. `Vec` order is emission order and is kept through staging
//!   and dispatch.
//! - Sequence numbers are assigned at append time, per aggregate
//!   (`(kind, id)`), starting right after the aggregate's last committed
//!   sequence (`seed`).
//! - Nothing in here is visible outside the owning unit of work until commit.

use std::collections::HashMap;

use super::event::{Event, EventRecord};
use super::ids::AggregateId;

#[derive(Debug, Default)]
pub struct CaptureBuffer {
    records: Vec<EventRecord>,

    /// Last sequence assigned (or committed) per `(kind, id)`.
    heads: HashMap<(String, AggregateId), u64>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the committed sequence an aggregate's next event continues from.
    ///
    /// Only the first seed counts; re-seeding after events were appended
    /// would reuse sequence numbers.
    pub fn seed(&mut self, aggregate_kind: &str, aggregate_id: &AggregateId, committed_sequence: u64) {
        self.heads
            .entry((aggregate_kind.to_string(), aggregate_id.clone()))
            .or_insert(committed_sequence);
    }

    /// Encode `event` and append it with the next sequence for `aggregate_id`.
    pub fn append<E: Event>(
        &mut self,
        aggregate_kind: &str,
        aggregate_id: &AggregateId,
        event: &E,
    ) -> Result<&EventRecord, serde_json::Error> {
        let key = (aggregate_kind.to_string(), aggregate_id.clone());
        let head = self.heads.get(&key).copied().unwrap_or(0);
        let record = EventRecord::encode(aggregate_id.clone(), aggregate_kind, event, head + 1)?;

        // Only advance once encoding succeeded, so a failed append leaves no gap.
        self.heads.insert(key, head + 1);
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn head(&self, aggregate_kind: &str, aggregate_id: &AggregateId) -> Option<u64> {
        self.heads
            .get(&(aggregate_kind.to_string(), aggregate_id.clone()))
            .copied()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand the captured records over (commit path).
    pub fn into_records(self) -> Vec<EventRecord> {
        self.records
    }
}
