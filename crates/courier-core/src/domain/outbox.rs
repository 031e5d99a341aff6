//! Outbox entry: staged event + delivery bookkeeping.
//!
//! State transitions:
//! - Pending -> (claim) -> Dispatched
//! - Pending -> (claim) -> Pending with `next_attempt_at` (retry scheduled)
//! - Pending -> (claim) -> Failed (max attempts / permanent error)
//! - Failed -> (replay) -> Pending
//!
//! All transitions happen through the methods here; stores only decide
//! *whether* a transition is allowed (lease ownership, ordering).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{DedupKey, EventRecord};
use super::ids::{AggregateId, EntryId, WorkerId};

/// Closed status set. Exhaustive matching keeps transitions checkable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,

    Dispatched {
        at: DateTime<Utc>,
    },

    /// Needs an operator: `replay` puts it back to Pending, `abandon` gives up
    /// on it for good.
    Failed {
        reason: String,
        #[serde(default)]
        abandoned: bool,
    },
}

impl OutboxStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, OutboxStatus::Pending)
    }

    pub fn is_dispatched(&self) -> bool {
        matches!(self, OutboxStatus::Dispatched { .. })
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, OutboxStatus::Failed { abandoned: true, .. })
    }
}

/// Single-owner claim on an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub owner: WorkerId,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: EntryId,
    pub record: EventRecord,
    pub dedup_key: DedupKey,
    pub status: OutboxStatus,

    /// Delivery attempts so far (incremented on every claim).
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,

    /// Retry backoff: not claimable before this instant.
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub lease: Option<Lease>,

    /// Store-assigned commit order (commit, then buffer order).
    pub position: u64,
    pub committed_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    /// A fresh Pending entry; `position`/`committed_at` are set by the store.
    pub fn pending(id: EntryId, record: EventRecord) -> Self {
        let dedup_key = record.dedup_key();
        Self {
            id,
            record,
            dedup_key,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
            next_attempt_at: None,
            last_error: None,
            lease: None,
            position: 0,
            committed_at: None,
        }
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        self.record.aggregate_id()
    }

    pub fn sequence(&self) -> u64 {
        self.record.sequence()
    }

    /// `(kind, id)`: entries of one stream are delivered in position order.
    pub fn stream(&self) -> (&str, &AggregateId) {
        self.record.stream()
    }

    /// Does this entry hold back later entries of its aggregate?
    pub fn blocks_stream(&self) -> bool {
        match &self.status {
            OutboxStatus::Pending => true,
            OutboxStatus::Dispatched { .. } => false,
            OutboxStatus::Failed { abandoned, .. } => !abandoned,
        }
    }

    /// Is this entry eligible for a claim right now (ignoring stream order)?
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_pending()
            && !self.lease.as_ref().is_some_and(|l| l.is_live(now))
            && self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// Whether `worker` may record an outcome for this entry.
    pub fn is_owned_by(&self, worker: &WorkerId, now: DateTime<Utc>) -> bool {
        match &self.lease {
            None => true,
            Some(lease) => &lease.owner == worker || !lease.is_live(now),
        }
    }

    /// Dispatched, or abandoned, at or before `cutoff`. Such an entry no
    /// longer affects claiming and may be pruned.
    pub fn settled_before(&self, cutoff: DateTime<Utc>) -> bool {
        match &self.status {
            OutboxStatus::Dispatched { at } => *at <= cutoff,
            OutboxStatus::Failed { abandoned: true, .. } => self
                .last_attempt_at
                .or(self.committed_at)
                .is_none_or(|at| at <= cutoff),
            _ => false,
        }
    }

    pub fn claim(&mut self, owner: WorkerId, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.lease = Some(Lease { owner, expires_at });
        self.attempts += 1;
        self.last_attempt_at = Some(now);
        self.next_attempt_at = None;
    }

    pub fn mark_dispatched(&mut self, now: DateTime<Utc>) {
        self.status = OutboxStatus::Dispatched { at: now };
        self.lease = None;
        self.next_attempt_at = None;
    }

    pub fn schedule_retry(&mut self, next_attempt_at: DateTime<Utc>, error: String) {
        self.status = OutboxStatus::Pending;
        self.lease = None;
        self.next_attempt_at = Some(next_attempt_at);
        self.last_error = Some(error);
    }

    pub fn mark_failed(&mut self, reason: String) {
        self.last_error = Some(reason.clone());
        self.status = OutboxStatus::Failed {
            reason,
            abandoned: false,
        };
        self.lease = None;
        self.next_attempt_at = None;
    }

    /// Operator replay: back to Pending with a fresh attempt budget.
    pub fn replay(&mut self) {
        self.status = OutboxStatus::Pending;
        self.attempts = 0;
        self.next_attempt_at = None;
        self.lease = None;
    }

    pub fn abandon(&mut self) {
        if let OutboxStatus::Failed { abandoned, .. } = &mut self.status {
            *abandoned = true;
        }
    }
}

/// Counts by status for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxCounts {
    pub pending: usize,
    pub in_flight: usize,
    pub retry_scheduled: usize,
    pub dispatched: usize,
    pub failed: usize,
    pub abandoned: usize,
}

impl OutboxCounts {
    pub fn tally<'a>(entries: impl IntoIterator<Item = &'a OutboxEntry>, now: DateTime<Utc>) -> Self {
        let mut counts = Self::default();
        for entry in entries {
            match &entry.status {
                OutboxStatus::Pending => {
                    if entry.lease.as_ref().is_some_and(|l| l.is_live(now)) {
                        counts.in_flight += 1;
                    } else if entry.next_attempt_at.is_some_and(|at| at > now) {
                        counts.retry_scheduled += 1;
                    } else {
                        counts.pending += 1;
                    }
                }
                OutboxStatus::Dispatched { .. } => counts.dispatched += 1,
                OutboxStatus::Failed { abandoned: true, .. } => counts.abandoned += 1,
                OutboxStatus::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// Nothing left for the dispatcher to do.
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.in_flight == 0 && self.retry_scheduled == 0
    }
}
