//! UnitOfWork - 状態変更とイベントを 1 つのトランザクションで commit する
//!
//! # フロー
//! 1. `begin(store)` でセッションと CaptureBuffer を作る
//! 2. `load` / `add` で aggregate を identity map に登録
//! 3. `raise` で event を apply + capture、`save` で状態だけ更新
//! 4. `save_changes(cancel)` で state write と outbox stage を同じ transaction で commit
//!
//! `commit()` is the point of no return. Cancellation is honoured up to it
//! and ignored after it. Dropping the unit of work without `save_changes`
//! discards everything.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::app::signal::DispatchSignal;
use crate::domain::{
    Aggregate, AggregateId, CaptureBuffer, EventRecord, ExpectedVersion, OutboxEntry, SessionId,
    StateWrite, StoreError, UnitOfWorkError,
};
use crate::ports::{IdGenerator, StoreTransaction, SystemClock, TransactionalStore, UlidGenerator};

/// Identity map entry.
struct Tracked {
    expected: ExpectedVersion,

    /// In-session state (committed state until something changes it).
    body: serde_json::Value,

    /// Last committed event sequence.
    committed_sequence: u64,

    dirty: bool,
}

pub struct UnitOfWork<S: TransactionalStore> {
    session_id: SessionId,
    store: S,
    ids: Arc<dyn IdGenerator>,
    tracked: HashMap<(&'static str, AggregateId), Tracked>,
    buffer: CaptureBuffer,
    signal: Option<DispatchSignal>,
}

impl<S: TransactionalStore> UnitOfWork<S> {
    pub fn begin(store: S) -> Self {
        Self::begin_with_ids(store, Arc::new(UlidGenerator::new(Arc::new(SystemClock))))
    }

    pub fn begin_with_ids(store: S, ids: Arc<dyn IdGenerator>) -> Self {
        let session_id = ids.generate_session_id();
        tracing::trace!(session = %session_id, "unit of work started");
        Self {
            session_id,
            store,
            ids,
            tracked: HashMap::new(),
            buffer: CaptureBuffer::new(),
            signal: None,
        }
    }

    /// Wake the dispatcher after a successful commit.
    pub fn with_signal(mut self, signal: DispatchSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Committed state, or the in-session state if this id was already
    /// loaded or added here.
    pub async fn load<A: Aggregate>(&mut self, id: &AggregateId) -> Result<Option<A>, UnitOfWorkError> {
        let key = (A::KIND, id.clone());
        if let Some(tracked) = self.tracked.get(&key) {
            return Ok(Some(serde_json::from_value(tracked.body.clone())?));
        }

        let Some(stored) = self.store.load(A::KIND, id).await? else {
            return Ok(None);
        };
        let aggregate: A = serde_json::from_value(stored.body.clone())?;
        self.buffer.seed(A::KIND, id, stored.sequence);
        self.tracked.insert(
            key,
            Tracked {
                expected: ExpectedVersion::Exactly(stored.version),
                body: stored.body,
                committed_sequence: stored.sequence,
                dirty: false,
            },
        );
        Ok(Some(aggregate))
    }

    /// Register a new aggregate. The commit fails with a conflict if it
    /// already exists in the store.
    pub fn add<A: Aggregate>(&mut self, aggregate: &A) -> Result<(), UnitOfWorkError> {
        let id = aggregate.id();
        let key = (A::KIND, id.clone());
        if self.tracked.contains_key(&key) {
            return Err(UnitOfWorkError::AlreadyTracked(id));
        }
        let body = serde_json::to_value(aggregate)?;
        self.buffer.seed(A::KIND, &id, 0);
        self.tracked.insert(
            key,
            Tracked {
                expected: ExpectedVersion::Absent,
                body,
                committed_sequence: 0,
                dirty: true,
            },
        );
        Ok(())
    }

    /// Capture `event` and apply it to `aggregate`. Returns the sequence
    /// assigned to the event.
    ///
    /// An event that fails to encode leaves both the aggregate and the
    /// buffer untouched.
    pub fn raise<A: Aggregate>(
        &mut self,
        aggregate: &mut A,
        event: A::Event,
    ) -> Result<u64, UnitOfWorkError> {
        let id = aggregate.id();
        let key = (A::KIND, id.clone());
        if !self.tracked.contains_key(&key) {
            return Err(UnitOfWorkError::Untracked(id));
        }

        let sequence = self.buffer.append(A::KIND, &id, &event)?.sequence();
        aggregate.apply(&event);
        let body = serde_json::to_value(&*aggregate)?;
        if let Some(tracked) = self.tracked.get_mut(&key) {
            tracked.body = body;
            tracked.dirty = true;
        }
        Ok(sequence)
    }

    /// State-only change (no event).
    pub fn save<A: Aggregate>(&mut self, aggregate: &A) -> Result<(), UnitOfWorkError> {
        let id = aggregate.id();
        let body = serde_json::to_value(aggregate)?;
        let tracked = self
            .tracked
            .get_mut(&(A::KIND, id.clone()))
            .ok_or(UnitOfWorkError::Untracked(id))?;
        tracked.body = body;
        tracked.dirty = true;
        Ok(())
    }

    pub fn pending_events(&self) -> &[EventRecord] {
        self.buffer.records()
    }

    /// Commit every dirty aggregate and the captured events atomically.
    ///
    /// Returns the number of state records written.
    pub async fn save_changes(self, cancel: &CancellationToken) -> Result<usize, UnitOfWorkError> {
        if cancel.is_cancelled() {
            return Err(UnitOfWorkError::Cancelled);
        }

        let Self {
            session_id,
            store,
            ids,
            tracked,
            buffer,
            signal,
        } = self;

        let writes: Vec<StateWrite> = tracked
            .into_iter()
            .filter(|(_, t)| t.dirty)
            .map(|((kind, aggregate_id), t)| StateWrite {
                kind: kind.to_string(),
                sequence: buffer.head(kind, &aggregate_id).unwrap_or(t.committed_sequence),
                aggregate_id,
                expected: t.expected,
                body: t.body,
            })
            .collect();
        let entries: Vec<OutboxEntry> = buffer
            .into_records()
            .into_iter()
            .map(|record| OutboxEntry::pending(ids.generate_entry_id(), record))
            .collect();

        if writes.is_empty() && entries.is_empty() {
            tracing::debug!(session = %session_id, "nothing to commit");
            return Ok(0);
        }

        let mut tx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UnitOfWorkError::Cancelled),
            tx = store.begin() => tx?,
        };

        let staged = entries.len();
        let prepared = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = prepare(&mut tx, writes, entries) => Some(result),
        };
        match prepared {
            None => {
                tx.rollback().await;
                tracing::info!(session = %session_id, "unit of work cancelled before commit");
                return Err(UnitOfWorkError::Cancelled);
            }
            Some(Err(e)) => {
                tx.rollback().await;
                tracing::warn!(session = %session_id, error = %e, "unit of work rolled back");
                return Err(e.into());
            }
            Some(Ok(())) => {}
        }

        if cancel.is_cancelled() {
            tx.rollback().await;
            return Err(UnitOfWorkError::Cancelled);
        }

        // point of no return: cancellation is advisory from here on
        let receipt = tx.commit().await.map_err(|e| {
            tracing::warn!(session = %session_id, error = %e, "commit failed");
            UnitOfWorkError::from(e)
        })?;
        tracing::info!(
            session = %session_id,
            affected = receipt.affected,
            staged,
            "unit of work committed"
        );

        if let Some(signal) = signal
            && receipt.staged > 0
        {
            signal.notify();
        }
        Ok(receipt.affected)
    }

    /// Discard everything. Same as dropping.
    pub fn abort(self) {
        tracing::debug!(
            session = %self.session_id,
            events = self.buffer.len(),
            "unit of work aborted"
        );
    }
}

async fn prepare<T: StoreTransaction>(
    tx: &mut T,
    writes: Vec<StateWrite>,
    entries: Vec<OutboxEntry>,
) -> Result<(), StoreError> {
    for write in writes {
        tx.write_state(write).await?;
    }
    tx.stage(entries).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Event, EventType};
    use crate::impls::{FaultPoint, InMemoryStore};
    use crate::ports::OutboxStore;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Deposited {
        amount: i64,
        at: DateTime<Utc>,
    }

    impl Event for Deposited {
        const TYPE: &'static str = "test.wallet.deposited.v1";

        fn occurred_on(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Wallet {
        id: String,
        balance: i64,
        label: String,
    }

    impl Wallet {
        fn open(id: &str) -> Self {
            Self {
                id: id.into(),
                balance: 0,
                label: String::new(),
            }
        }
    }

    impl Aggregate for Wallet {
        const KIND: &'static str = "wallet";
        type Event = Deposited;

        fn id(&self) -> AggregateId {
            AggregateId::new(self.id.clone())
        }

        fn apply(&mut self, event: &Deposited) {
            self.balance += event.amount;
        }
    }

    /// Same id space as `Wallet`, different kind.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ledger {
        id: String,
        total: i64,
    }

    impl Aggregate for Ledger {
        const KIND: &'static str = "ledger";
        type Event = Deposited;

        fn id(&self) -> AggregateId {
            AggregateId::new(self.id.clone())
        }

        fn apply(&mut self, event: &Deposited) {
            self.total += event.amount;
        }
    }

    fn deposit(amount: i64) -> Deposited {
        Deposited {
            amount,
            at: Utc::now(),
        }
    }

    async fn seed_wallet(store: &InMemoryStore, id: &str, deposits: &[i64]) {
        let mut uow = UnitOfWork::begin(store.clone());
        let mut wallet = Wallet::open(id);
        uow.add(&wallet).unwrap();
        for &amount in deposits {
            uow.raise(&mut wallet, deposit(amount)).unwrap();
        }
        uow.save_changes(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn commit_persists_state_and_events_together() {
        let store = InMemoryStore::new();
        let mut uow = UnitOfWork::begin(store.clone());
        let mut wallet = Wallet::open("A");
        uow.add(&wallet).unwrap();
        uow.raise(&mut wallet, deposit(10)).unwrap();
        uow.raise(&mut wallet, deposit(5)).unwrap();

        let sequences: Vec<u64> = uow.pending_events().iter().map(|r| r.sequence()).collect();
        assert_eq!(sequences, vec![1, 2]);

        let affected = uow.save_changes(&CancellationToken::new()).await.unwrap();
        assert_eq!(affected, 1);

        let pending = store.fetch_pending_batch(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].dedup_key.as_str(), "wallet/A#1");
        assert_eq!(pending[1].dedup_key.as_str(), "wallet/A#2");
        assert_eq!(pending[0].record.event_type(), &EventType::of::<Deposited>());

        let stored = store
            .load(Wallet::KIND, &AggregateId::new("A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.sequence, 2);
        assert_eq!(stored.body["balance"], 15);
    }

    #[tokio::test]
    async fn sequences_continue_across_sessions() {
        let store = InMemoryStore::new();
        seed_wallet(&store, "A", &[1, 2]).await;

        let mut uow = UnitOfWork::begin(store.clone());
        let mut wallet: Wallet = uow.load(&AggregateId::new("A")).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 3);
        uow.raise(&mut wallet, deposit(4)).unwrap();
        assert_eq!(uow.pending_events()[0].sequence(), 3);
        uow.save_changes(&CancellationToken::new()).await.unwrap();

        assert_eq!(store.fetch_pending_batch(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn aggregates_of_different_kinds_with_one_id_do_not_collide() {
        let store = InMemoryStore::new();
        seed_wallet(&store, "1", &[5]).await;

        // a later session: first event of ledger/1 must not reuse wallet/1's key
        let mut uow = UnitOfWork::begin(store.clone());
        let mut ledger = Ledger {
            id: "1".into(),
            total: 0,
        };
        uow.add(&ledger).unwrap();
        assert_eq!(uow.raise(&mut ledger, deposit(3)).unwrap(), 1);
        uow.save_changes(&CancellationToken::new()).await.unwrap();

        // one session touching both: each keeps its own sequence
        let mut uow = UnitOfWork::begin(store.clone());
        let mut wallet: Wallet = uow.load(&AggregateId::new("1")).await.unwrap().unwrap();
        let mut ledger: Ledger = uow.load(&AggregateId::new("1")).await.unwrap().unwrap();
        assert_eq!(uow.raise(&mut wallet, deposit(1)).unwrap(), 2);
        assert_eq!(uow.raise(&mut ledger, deposit(1)).unwrap(), 2);
        uow.save_changes(&CancellationToken::new()).await.unwrap();

        let keys: Vec<String> = store
            .fetch_pending_batch(10)
            .await
            .unwrap()
            .iter()
            .map(|e| e.dedup_key.to_string())
            .collect();
        assert_eq!(keys, vec!["wallet/1#1", "ledger/1#1", "wallet/1#2", "ledger/1#2"]);
        for kind in [Wallet::KIND, Ledger::KIND] {
            let stored = store.load(kind, &AggregateId::new("1")).await.unwrap().unwrap();
            assert_eq!(stored.sequence, 2);
        }
    }

    #[tokio::test]
    async fn load_returns_in_session_state() {
        let store = InMemoryStore::new();
        let mut uow = UnitOfWork::begin(store);
        let mut wallet = Wallet::open("A");
        uow.add(&wallet).unwrap();
        uow.raise(&mut wallet, deposit(7)).unwrap();

        let again: Wallet = uow.load(&AggregateId::new("A")).await.unwrap().unwrap();
        assert_eq!(again.balance, 7);
        assert!(matches!(
            uow.add(&again),
            Err(UnitOfWorkError::AlreadyTracked(_))
        ));
    }

    #[tokio::test]
    async fn raise_on_untracked_aggregate_is_rejected() {
        let mut uow = UnitOfWork::begin(InMemoryStore::new());
        let mut wallet = Wallet::open("A");
        let err = uow.raise(&mut wallet, deposit(1)).unwrap_err();
        assert!(matches!(err, UnitOfWorkError::Untracked(_)));
        assert_eq!(wallet.balance, 0);
        assert!(uow.pending_events().is_empty());
    }

    #[tokio::test]
    async fn save_writes_state_without_events() {
        let store = InMemoryStore::new();
        seed_wallet(&store, "A", &[]).await;

        let mut uow = UnitOfWork::begin(store.clone());
        let mut wallet: Wallet = uow.load(&AggregateId::new("A")).await.unwrap().unwrap();
        wallet.label = "savings".into();
        uow.save(&wallet).unwrap();
        assert_eq!(uow.save_changes(&CancellationToken::new()).await.unwrap(), 1);

        let stored = store.load(Wallet::KIND, &AggregateId::new("A")).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.body["label"], "savings");
        assert!(store.fetch_pending_batch(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_commit_leaves_nothing() {
        let store = InMemoryStore::new();
        let mut uow = UnitOfWork::begin(store.clone());
        let mut wallet = Wallet::open("A");
        uow.add(&wallet).unwrap();
        uow.raise(&mut wallet, deposit(10)).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = uow.save_changes(&cancel).await.unwrap_err();

        assert!(matches!(err, UnitOfWorkError::Cancelled));
        assert!(store.load(Wallet::KIND, &AggregateId::new("A")).await.unwrap().is_none());
        assert!(store.fetch_pending_batch(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrency_conflict_keeps_prior_state() {
        let store = InMemoryStore::new();
        seed_wallet(&store, "A", &[10]).await;

        let mut first = UnitOfWork::begin(store.clone());
        let mut second = UnitOfWork::begin(store.clone());
        let mut w1: Wallet = first.load(&AggregateId::new("A")).await.unwrap().unwrap();
        let mut w2: Wallet = second.load(&AggregateId::new("A")).await.unwrap().unwrap();

        first.raise(&mut w1, deposit(1)).unwrap();
        first.save_changes(&CancellationToken::new()).await.unwrap();

        second.raise(&mut w2, deposit(100)).unwrap();
        let err = second.save_changes(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, UnitOfWorkError::ConcurrencyConflict(_)));

        let stored = store.load(Wallet::KIND, &AggregateId::new("A")).await.unwrap().unwrap();
        assert_eq!(stored.body["balance"], 11);
        let amounts: Vec<i64> = store
            .fetch_pending_batch(10)
            .await
            .unwrap()
            .iter()
            .map(|e| e.record.decode::<Deposited>().unwrap().amount)
            .collect();
        assert_eq!(amounts, vec![10, 1]);
    }

    #[tokio::test]
    async fn adding_an_existing_aggregate_conflicts() {
        let store = InMemoryStore::new();
        seed_wallet(&store, "A", &[]).await;

        let mut uow = UnitOfWork::begin(store.clone());
        uow.add(&Wallet::open("A")).unwrap();
        let err = uow.save_changes(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, UnitOfWorkError::ConcurrencyConflict(_)));
    }

    #[tokio::test]
    async fn storage_failure_is_surfaced_and_nothing_is_applied() {
        let store = InMemoryStore::new();
        let mut uow = UnitOfWork::begin(store.clone());
        let mut a = Wallet::open("A");
        let mut b = Wallet::open("B");
        uow.add(&a).unwrap();
        uow.add(&b).unwrap();
        uow.raise(&mut a, deposit(1)).unwrap();
        uow.raise(&mut b, deposit(2)).unwrap();

        store.inject_fault(FaultPoint::Commit);
        let err = uow.save_changes(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, UnitOfWorkError::StorageFailure(_)));

        for id in ["A", "B"] {
            assert!(store.load(Wallet::KIND, &AggregateId::new(id)).await.unwrap().is_none());
        }
        assert!(store.fetch_pending_batch(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stage_fault_rolls_back() {
        let store = InMemoryStore::new();
        let mut uow = UnitOfWork::begin(store.clone());
        let mut a = Wallet::open("A");
        uow.add(&a).unwrap();
        uow.raise(&mut a, deposit(1)).unwrap();

        store.inject_fault(FaultPoint::Stage);
        assert!(uow.save_changes(&CancellationToken::new()).await.is_err());
        assert!(store.load(Wallet::KIND, &AggregateId::new("A")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_signals_the_dispatcher() {
        let store = InMemoryStore::new();
        let signal = DispatchSignal::new();
        let mut uow = UnitOfWork::begin(store).with_signal(signal.clone());
        let mut a = Wallet::open("A");
        uow.add(&a).unwrap();
        uow.raise(&mut a, deposit(1)).unwrap();
        uow.save_changes(&CancellationToken::new()).await.unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), signal.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn abort_discards_everything() {
        let store = InMemoryStore::new();
        let mut uow = UnitOfWork::begin(store.clone());
        let mut a = Wallet::open("A");
        uow.add(&a).unwrap();
        uow.raise(&mut a, deposit(1)).unwrap();
        uow.abort();

        assert!(store.load(Wallet::KIND, &AggregateId::new("A")).await.unwrap().is_none());
        assert!(store.counts().await.unwrap().is_settled());
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Hold {
        Stage,
        Commit,
    }

    /// InMemoryStore that parks at one step until released.
    #[derive(Clone)]
    struct HeldStore {
        inner: InMemoryStore,
        hold: Hold,
        reached: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    impl HeldStore {
        fn new(inner: InMemoryStore, hold: Hold) -> Self {
            Self {
                inner,
                hold,
                reached: Arc::new(tokio::sync::Notify::new()),
                release: Arc::new(tokio::sync::Notify::new()),
            }
        }

        async fn park(&self, at: Hold) {
            if self.hold == at {
                self.reached.notify_one();
                self.release.notified().await;
            }
        }
    }

    struct HeldTransaction {
        inner: crate::impls::InMemoryTransaction,
        store: HeldStore,
    }

    #[async_trait::async_trait]
    impl TransactionalStore for HeldStore {
        type Transaction = HeldTransaction;

        async fn load(
            &self,
            kind: &str,
            id: &AggregateId,
        ) -> Result<Option<crate::domain::StoredState>, StoreError> {
            self.inner.load(kind, id).await
        }

        async fn begin(&self) -> Result<HeldTransaction, StoreError> {
            Ok(HeldTransaction {
                inner: self.inner.begin().await?,
                store: self.clone(),
            })
        }
    }

    #[async_trait::async_trait]
    impl StoreTransaction for HeldTransaction {
        async fn write_state(&mut self, write: StateWrite) -> Result<(), StoreError> {
            self.inner.write_state(write).await
        }

        async fn stage(&mut self, entries: Vec<OutboxEntry>) -> Result<(), StoreError> {
            self.store.park(Hold::Stage).await;
            self.inner.stage(entries).await
        }

        async fn commit(self) -> Result<crate::ports::CommitReceipt, StoreError> {
            self.store.park(Hold::Commit).await;
            self.inner.commit().await
        }

        async fn rollback(self) {
            self.inner.rollback().await
        }
    }

    #[tokio::test]
    async fn cancel_while_staging_leaves_nothing() {
        let store = InMemoryStore::new();
        let held = HeldStore::new(store.clone(), Hold::Stage);
        let mut uow = UnitOfWork::begin(held.clone());
        let mut wallet = Wallet::open("A");
        uow.add(&wallet).unwrap();
        uow.raise(&mut wallet, deposit(10)).unwrap();

        let cancel = CancellationToken::new();
        let (result, ()) = tokio::join!(uow.save_changes(&cancel), async {
            held.reached.notified().await;
            cancel.cancel();
        });

        assert!(matches!(result, Err(UnitOfWorkError::Cancelled)));
        assert!(store.load(Wallet::KIND, &AggregateId::new("A")).await.unwrap().is_none());
        assert!(store.fetch_pending_batch(10).await.unwrap().is_empty());
        assert_eq!(store.counts().await.unwrap(), crate::domain::OutboxCounts::default());
    }

    #[tokio::test]
    async fn cancel_during_commit_does_not_undo_it() {
        let store = InMemoryStore::new();
        let held = HeldStore::new(store.clone(), Hold::Commit);
        let mut uow = UnitOfWork::begin(held.clone());
        let mut wallet = Wallet::open("A");
        uow.add(&wallet).unwrap();
        uow.raise(&mut wallet, deposit(10)).unwrap();
        uow.raise(&mut wallet, deposit(5)).unwrap();

        let cancel = CancellationToken::new();
        let (result, ()) = tokio::join!(uow.save_changes(&cancel), async {
            held.reached.notified().await;
            cancel.cancel();
            held.release.notify_one();
        });

        assert_eq!(result.unwrap(), 1);
        let stored = store
            .load(Wallet::KIND, &AggregateId::new("A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.body["balance"], 15);
        assert_eq!(stored.sequence, 2);
        assert_eq!(store.fetch_pending_batch(10).await.unwrap().len(), 2);
    }
}
