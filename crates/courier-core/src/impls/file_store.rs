//! FileStore - JSON snapshot を使う永続 adapter
//!
//! Every mutation works on a copy of the state, writes the whole snapshot to
//! `<path>.tmp`, fsyncs it, renames it over `<path>`, fsyncs the directory,
//! and only then swaps the copy in. A crash at any point leaves either the
//! old or the new snapshot.
//!
//! Small volumes only: the snapshot is rewritten on every change. Idle
//! claims do not count as a change, and `prune_settled` keeps the snapshot
//! from growing forever.

use std::path::{Path, PathBuf};
use std::sync::Arc;
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

struct Inner {
    path: PathBuf,
    tmp_path: PathBuf,
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct FileStore {
    inner: Arc<Inner>,
}

impl FileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_clock(path, Arc::new(SystemClock)).await
    }

    /// Load the snapshot at `path`, or start empty when there is none.
    /// Leases found in the snapshot belonged to a previous process and are
    /// released.
    pub async fn open_with_clock(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let mut state: StoreState = serde_json::from_slice(&bytes)?;
                state.rebuild_index();
                state.release_leases();
                tracing::info!(path = %path.display(), "outbox snapshot loaded");
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no snapshot yet, starting empty");
                StoreState::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut tmp_path = path.clone().into_os_string();
        tmp_path.push(".tmp");
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                tmp_path: PathBuf::from(tmp_path),
                state: Mutex::new(state),
                clock,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    async fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = &self.inner.tmp_path;
        tokio::fs::write(tmp, &bytes).await?;
        tokio::fs::File::open(tmp).await?.sync_all().await?;
        tokio::fs::rename(tmp, &self.inner.path).await?;
        self.sync_dir().await?;
        tracing::trace!(path = %self.inner.path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    /// Make the rename itself durable.
    #[cfg(unix)]
    async fn sync_dir(&self) -> Result<(), StoreError> {
        let dir = match self.inner.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        tokio::fs::File::open(dir).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_dir(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Apply `f` to a copy, persist it, then publish it.
    async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut StoreState, DateTime<Utc>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self.inner.state.lock().await;
        self.apply(&mut guard, f).await
    }

    async fn apply<R>(
        &self,
        current: &mut StoreState,
        f: impl FnOnce(&mut StoreState, DateTime<Utc>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut next = current.clone();
        let out = f(&mut next, self.now())?;
        self.persist(&next).await?;
        *current = next;
        Ok(out)
    }
}

pub struct FileTransaction {
    store: FileStore,
    writes: Vec<StateWrite>,
    entries: Vec<OutboxEntry>,
}

#[async_trait]
impl TransactionalStore for FileStore {
    type Transaction = FileTransaction;

    async fn load(&self, kind: &str, id: &AggregateId) -> Result<Option<StoredState>, StoreError> {
        Ok(self.inner.state.lock().await.load(kind, id))
    }

    async fn begin(&self) -> Result<FileTransaction, StoreError> {
        Ok(FileTransaction {
            store: self.clone(),
            writes: Vec::new(),
            entries: Vec::new(),
        })
    }
}

#[async_trait]
impl StoreTransaction for FileTransaction {
    async fn write_state(&mut self, write: StateWrite) -> Result<(), StoreError> {
        self.store.inner.state.lock().await.check_write(&write)?;
        self.writes.push(write);
        Ok(())
    }

    async fn stage(&mut self, entries: Vec<OutboxEntry>) -> Result<(), StoreError> {
        self.entries.extend(entries);
        Ok(())
    }

    async fn commit(self) -> Result<CommitReceipt, StoreError> {
        let Self {
            store,
            writes,
            entries,
        } = self;
        store
            .mutate(move |state, now| state.apply_commit(writes, entries, now))
            .await
    }

    async fn rollback(self) {}
}

#[async_trait]
impl OutboxStore for FileStore {
    async fn fetch_pending_batch(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError> {
        Ok(self.inner.state.lock().await.fetch_pending(limit))
    }

    async fn claim_next(
        &self,
        worker: &WorkerId,
        lease: Duration,
    ) -> Result<Option<OutboxEntry>, StoreError> {
        let mut guard = self.inner.state.lock().await;
        // idle poll: nothing changes, nothing is written
        if !guard.has_claimable(self.now()) {
            return Ok(None);
        }
        // claim の attempts もスナップショットに残す
        self.apply(&mut guard, |state, now| Ok(state.claim_next(worker, lease, now)))
            .await
    }

    async fn mark_dispatched(&self, id: EntryId, worker: &WorkerId) -> Result<bool, StoreError> {
        self.mutate(|state, now| state.mark_dispatched(id, worker, now))
            .await
    }

    async fn schedule_retry(
        &self,
        id: EntryId,
        worker: &WorkerId,
        reason: String,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.mutate(|state, now| state.schedule_retry(id, worker, reason, next_attempt_at, now))
            .await
    }

    async fn mark_failed(
        &self,
        id: EntryId,
        worker: &WorkerId,
        reason: String,
    ) -> Result<(), StoreError> {
        self.mutate(|state, now| state.mark_failed(id, worker, reason, now))
            .await
    }

    async fn replay(&self, id: EntryId) -> Result<(), StoreError> {
        self.mutate(|state, _| state.replay(id)).await
    }

    async fn abandon(&self, id: EntryId) -> Result<(), StoreError> {
        self.mutate(|state, _| state.abandon(id)).await
    }

    async fn prune_settled(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut guard = self.inner.state.lock().await;
        let mut next = guard.clone();
        let pruned = next.prune_settled(cutoff);
        if pruned > 0 {
            self.persist(&next).await?;
            *guard = next;
            tracing::debug!(pruned, path = %self.inner.path.display(), "settled entries pruned");
        }
        Ok(pruned)
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
