//! InMemoryStore - 開発用・テスト用の正本
//!
//! One lock around `StoreState` gives every commit a single atomic step.
//! Test helpers:
//! - `inject_fault(FaultPoint)` arms a one-shot `StoreError::Unavailable`
//! - `crash_and_recover()` keeps committed data, drops leases and open
//!   transactions (as if the process died and came back)

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::store_state::StoreState;
use crate::domain::{
    AggregateId, EntryId, OutboxCounts, OutboxEntry, StateWrite, StoreError, StoredState, WorkerId,
};
use crate::ports::{
    Clock, CommitReceipt, OutboxStore, StoreTransaction, SystemClock, TransactionalStore,
};

/// Where an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Load,
    Begin,
    Stage,
    /// Inside `commit`, before anything is applied.
    Commit,
    Claim,
    /// `mark_dispatched`: simulates a crash after delivery, before the ack.
    Ack,
}

struct Inner {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
    faults: std::sync::Mutex<HashSet<FaultPoint>>,

    /// Bumped on every simulated crash; older transactions are dead.
    epoch: AtomicU64,
}

#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StoreState::new()),
                clock,
                faults: std::sync::Mutex::new(HashSet::new()),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn inject_fault(&self, point: FaultPoint) {
        self.faults().insert(point);
    }

    pub async fn crash_and_recover(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        let mut state = self.inner.state.lock().await;
        state.release_leases();
        tracing::info!("in-memory store recovered: leases released, open transactions dropped");
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, HashSet<FaultPoint>> {
        self.inner.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn trip(&self, point: FaultPoint) -> Result<(), StoreError> {
        if self.faults().remove(&point) {
            tracing::debug!(?point, "injected fault fired");
            return Err(StoreError::Unavailable(format!("injected fault at {point:?}")));
        }
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InMemoryTransaction {
    store: InMemoryStore,
    epoch: u64,
    writes: Vec<StateWrite>,
    entries: Vec<OutboxEntry>,
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn load(&self, kind: &str, id: &AggregateId) -> Result<Option<StoredState>, StoreError> {
        self.trip(FaultPoint::Load)?;
        Ok(self.inner.state.lock().await.load(kind, id))
    }

    async fn begin(&self) -> Result<InMemoryTransaction, StoreError> {
        self.trip(FaultPoint::Begin)?;
        Ok(InMemoryTransaction {
            store: self.clone(),
            epoch: self.inner.epoch.load(Ordering::SeqCst),
            writes: Vec::new(),
            entries: Vec::new(),
        })
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn write_state(&mut self, write: StateWrite) -> Result<(), StoreError> {
        self.store.inner.state.lock().await.check_write(&write)?;
        self.writes.push(write);
        Ok(())
    }

    async fn stage(&mut self, entries: Vec<OutboxEntry>) -> Result<(), StoreError> {
        self.store.trip(FaultPoint::Stage)?;
        self.entries.extend(entries);
        Ok(())
    }

    async fn commit(self) -> Result<CommitReceipt, StoreError> {
        let mut state = self.store.inner.state.lock().await;
        if self.store.inner.epoch.load(Ordering::SeqCst) != self.epoch {
            return Err(StoreError::Unavailable(
                "store restarted while the transaction was open".into(),
            ));
        }
        self.store.trip(FaultPoint::Commit)?;
        state.apply_commit(self.writes, self.entries, self.store.now())
    }

    async fn rollback(self) {
        tracing::debug!(
            writes = self.writes.len(),
            entries = self.entries.len(),
            "in-memory transaction rolled back"
        );
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn fetch_pending_batch(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError> {
        Ok(self.inner.state.lock().await.fetch_pending(limit))
    }

    async fn claim_next(
        &self,
        worker: &WorkerId,
        lease: Duration,
    ) -> Result<Option<OutboxEntry>, StoreError> {
        self.trip(FaultPoint::Claim)?;
        let now = self.now();
        Ok(self.inner.state.lock().await.claim_next(worker, lease, now))
    }

    async fn mark_dispatched(&self, id: EntryId, worker: &WorkerId) -> Result<bool, StoreError> {
        self.trip(FaultPoint::Ack)?;
        let now = self.now();
        self.inner.state.lock().await.mark_dispatched(id, worker, now)
    }

    async fn schedule_retry(
        &self,
        id: EntryId,
        worker: &WorkerId,
        reason: String,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let now = self.now();
        self.inner
            .state
            .lock()
            .await
            .schedule_retry(id, worker, reason, next_attempt_at, now)
    }

    async fn mark_failed(
        &self,
        id: EntryId,
        worker: &WorkerId,
        reason: String,
    ) -> Result<(), StoreError> {
        let now = self.now();
        self.inner.state.lock().await.mark_failed(id, worker, reason, now)
    }

    async fn replay(&self, id: EntryId) -> Result<(), StoreError> {
        self.inner.state.lock().await.replay(id)
    }

    async fn abandon(&self, id: EntryId) -> Result<(), StoreError> {
        self.inner.state.lock().await.abandon(id)
    }

    async fn prune_settled(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.inner.state.lock().await.prune_settled(cutoff))
    }

    async fn get(&self, id: EntryId) -> Result<Option<OutboxEntry>, StoreError> {
        Ok(self.inner.state.lock().await.get(id))
    }

    async fn next_due_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let now = self.now();
        Ok(self.inner.state.lock().await.next_due_at(now))
    }

    async fn counts(&self) -> Result<OutboxCounts, StoreError> {
        let now = self.now();
        Ok(self.inner.state.lock().await.counts(now))
    }
}
