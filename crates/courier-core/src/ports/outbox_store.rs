//! OutboxStore port - dispatcher 側から見た outbox
//!
//! Claim rules:
//! - Entries are scanned in `position` order.
//! - The first blocking entry of an aggregate (pending, in flight, backing
//!   off, or Failed and not abandoned) hides every later entry of that
//!   aggregate. Other aggregates are unaffected.
//! - A live lease excludes the entry; an expired lease makes it claimable
//!   again (redelivery).
//! - `mark_*` calls need lease ownership, or an expired/absent lease.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{EntryId, OutboxCounts, OutboxEntry, StoreError, WorkerId};

#[async_trait]
pub trait OutboxStore: Send + Sync + 'static {
    /// Pending entries in dispatch order (read-only, no claim).
    async fn fetch_pending_batch(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError>;

    /// Claim the next deliverable entry for `worker`, honouring the rules above.
    async fn claim_next(
        &self,
        worker: &WorkerId,
        lease: Duration,
    ) -> Result<Option<OutboxEntry>, StoreError>;

    /// Pending -> Dispatched. A second call for a Dispatched entry is a no-op
    /// and returns `false`.
    async fn mark_dispatched(&self, id: EntryId, worker: &WorkerId) -> Result<bool, StoreError>;

    /// Release the claim and keep the entry Pending until `next_attempt_at`.
    async fn schedule_retry(
        &self,
        id: EntryId,
        worker: &WorkerId,
        reason: String,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Pending -> Failed (terminal until replayed).
    async fn mark_failed(
        &self,
        id: EntryId,
        worker: &WorkerId,
        reason: String,
    ) -> Result<(), StoreError>;

    /// Failed -> Pending with a fresh attempt budget.
    async fn replay(&self, id: EntryId) -> Result<(), StoreError>;

    /// Failed stays Failed but stops holding back its aggregate.
    async fn abandon(&self, id: EntryId) -> Result<(), StoreError>;

    /// Retention: remove Dispatched and abandoned entries settled at or
    /// before `cutoff`. Returns how many were removed.
    async fn prune_settled(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn get(&self, id: EntryId) -> Result<Option<OutboxEntry>, StoreError>;

    /// Earliest instant a currently blocked entry (backoff or lease) may
    /// become claimable. Used to size idle waits.
    async fn next_due_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn counts(&self) -> Result<OutboxCounts, StoreError>;
}
