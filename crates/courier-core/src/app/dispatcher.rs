//! Dispatcher - outbox から consumer への配送
//!
//! # フロー（1 entry）
//! 1. `OutboxStore::claim_next()` で lease 付きで取得（順序ルールは store 側）
//! 2. Subscriptions から consumer を引いて順に deliver（全体で 1 つの timeout）
//! 3. 全 consumer 成功 -> `mark_dispatched`
//! 4. 失敗 -> Decider -> `schedule_retry` か `mark_failed`
//!
//! One logical consumer group per entry: the entry is Dispatched only when
//! every subscribed consumer acknowledged it. A failure makes the whole
//! entry retry, so consumers that already succeeded see it again and must
//! dedup on `Delivery::dedup_key`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::signal::DispatchSignal;
use crate::app::status::Status;
use crate::app::worker::WorkerGroup;
use crate::config::DispatcherConfig;
use crate::domain::{
    Decider, Decision, DeliveryError, EntryId, OutboxCounts, OutboxEntry, StoreError, WorkerId,
};
use crate::ports::clock::{add_std, sub_std};
use crate::ports::{Clock, Delivery, OutboxStore};
use crate::typed::Subscriptions;

/// What happened to the entry a worker claimed.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Dispatched { entry: EntryId, attempt: u32 },
    RetryScheduled { entry: EntryId, attempt: u32, at: DateTime<Utc> },
    Failed { entry: EntryId, reason: String },

    /// Delivered, but another worker owns the entry now (our lease expired)
    /// or it was already acknowledged. The store state was left alone.
    Superseded { entry: EntryId },
}

pub struct Dispatcher<S: OutboxStore> {
    store: Arc<S>,
    subscriptions: Arc<Subscriptions>,
    decider: Arc<dyn Decider>,
    clock: Arc<dyn Clock>,
    config: DispatcherConfig,
    signal: DispatchSignal,
}

impl<S: OutboxStore> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            subscriptions: Arc::clone(&self.subscriptions),
            decider: Arc::clone(&self.decider),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            signal: self.signal.clone(),
        }
    }
}

impl<S: OutboxStore> Dispatcher<S> {
    /// Use `DispatcherBuilder` unless every part is already at hand.
    pub fn new(
        store: Arc<S>,
        subscriptions: Subscriptions,
        decider: Arc<dyn Decider>,
        clock: Arc<dyn Clock>,
        config: DispatcherConfig,
        signal: DispatchSignal,
    ) -> Self {
        Self {
            store,
            subscriptions: Arc::new(subscriptions),
            decider,
            clock,
            config,
            signal,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Hand this to units of work so commits wake idle workers.
    pub fn signal(&self) -> &DispatchSignal {
        &self.signal
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Claim and process one entry. `Ok(None)` means nothing is deliverable
    /// right now.
    pub async fn process_one(&self, worker: &WorkerId) -> Result<Option<DispatchOutcome>, StoreError> {
        let Some(entry) = self.store.claim_next(worker, self.config.lease).await? else {
            return Ok(None);
        };
        tracing::debug!(
            worker = %worker,
            entry_id = %entry.id,
            aggregate_id = %entry.aggregate_id(),
            sequence = entry.sequence(),
            attempt = entry.attempts,
            "entry claimed"
        );

        let outcome = match self.deliver(&entry).await {
            Ok(()) => self.acknowledge(&entry, worker).await?,
            Err(error) => self.handle_failure(&entry, worker, error).await?,
        };
        Ok(Some(outcome))
    }

    /// Process until nothing is deliverable. Returns how many entries were
    /// handled (whatever their outcome).
    pub async fn drain(&self, worker: &WorkerId) -> Result<usize, StoreError> {
        let mut handled = 0;
        while self.process_one(worker).await?.is_some() {
            handled += 1;
        }
        Ok(handled)
    }

    /// Pending entries in dispatch order (read-only).
    pub async fn pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError> {
        self.store.fetch_pending_batch(limit).await
    }

    pub async fn counts(&self) -> Result<OutboxCounts, StoreError> {
        self.store.counts().await
    }

    pub async fn status(&self) -> Result<Status, StoreError> {
        Ok(Status {
            counts: self.store.counts().await?,
            next_due_at: self.store.next_due_at().await?,
            subscribed_types: self
                .subscriptions
                .registered_types()
                .into_iter()
                .map(|t| t.as_str().to_string())
                .collect(),
        })
    }

    /// Operator action: put a Failed entry back in line.
    pub async fn replay(&self, id: EntryId) -> Result<(), StoreError> {
        self.store.replay(id).await?;
        tracing::info!(entry_id = %id, "failed entry replayed");
        self.signal.notify();
        Ok(())
    }

    /// Operator action: give up on a Failed entry so its aggregate moves on.
    pub async fn abandon(&self, id: EntryId) -> Result<(), StoreError> {
        self.store.abandon(id).await?;
        tracing::warn!(entry_id = %id, "failed entry abandoned");
        self.signal.notify();
        Ok(())
    }

    /// Retention sweep: drop entries that settled more than
    /// `config.retention` ago.
    pub async fn prune_settled(&self) -> Result<usize, StoreError> {
        let cutoff = sub_std(self.clock.now(), self.config.retention);
        let pruned = self.store.prune_settled(cutoff).await?;
        if pruned > 0 {
            tracing::info!(pruned, %cutoff, "settled entries pruned");
        }
        Ok(pruned)
    }

    /// Start the worker pool.
    pub fn spawn(&self) -> WorkerGroup {
        WorkerGroup::spawn(self.clone())
    }

    /// Earliest time an idle worker should look again.
    pub(crate) async fn idle_wait(&self) -> std::time::Duration {
        let poll = self.config.poll_interval;
        match self.store.next_due_at().await {
            Ok(Some(at)) => crate::ports::clock::until(self.clock.now(), at).min(poll),
            _ => poll,
        }
    }

    async fn deliver(&self, entry: &OutboxEntry) -> Result<(), DeliveryError> {
        let consumers = self.subscriptions.consumers_for(entry.record.event_type());
        if consumers.is_empty() {
            tracing::debug!(
                entry_id = %entry.id,
                event_type = %entry.record.event_type(),
                "no subscribers, nothing to deliver"
            );
            return Ok(());
        }

        let delivery = Delivery {
            entry_id: entry.id,
            dedup_key: entry.dedup_key.clone(),
            attempt: entry.attempts,
            record: entry.record.clone(),
        };
        // one budget for the whole fan-out: the lease (> delivery_timeout)
        // must still be ours when the last consumer returns
        let fan_out = async {
            for consumer in consumers {
                if let Err(e) = consumer.deliver(&delivery).await {
                    tracing::debug!(
                        entry_id = %entry.id,
                        consumer = consumer.name(),
                        error = %e,
                        "delivery failed"
                    );
                    return Err(e);
                }
                tracing::trace!(entry_id = %entry.id, consumer = consumer.name(), "delivered");
            }
            Ok(())
        };
        match tokio::time::timeout(self.config.delivery_timeout, fan_out).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.config.delivery_timeout)),
        }
    }

    async fn acknowledge(
        &self,
        entry: &OutboxEntry,
        worker: &WorkerId,
    ) -> Result<DispatchOutcome, StoreError> {
        match self.store.mark_dispatched(entry.id, worker).await {
            Ok(true) => {
                tracing::debug!(
                    entry_id = %entry.id,
                    aggregate_id = %entry.aggregate_id(),
                    attempt = entry.attempts,
                    "entry dispatched"
                );
                Ok(DispatchOutcome::Dispatched {
                    entry: entry.id,
                    attempt: entry.attempts,
                })
            }
            Ok(false) => Ok(DispatchOutcome::Superseded { entry: entry.id }),
            Err(StoreError::LeaseLost { holder, .. }) => {
                tracing::warn!(
                    entry_id = %entry.id,
                    worker = %worker,
                    holder = %holder,
                    "lease lost before ack, entry will be delivered again"
                );
                Ok(DispatchOutcome::Superseded { entry: entry.id })
            }
            Err(e) => Err(e),
        }
    }

    async fn handle_failure(
        &self,
        entry: &OutboxEntry,
        worker: &WorkerId,
        error: DeliveryError,
    ) -> Result<DispatchOutcome, StoreError> {
        let decision = self.decider.decide(entry, &error);
        let recorded = match &decision {
            Decision::Retry { delay, reason } => {
                let at = add_std(self.clock.now(), *delay);
                tracing::warn!(
                    entry_id = %entry.id,
                    aggregate_id = %entry.aggregate_id(),
                    attempt = entry.attempts,
                    retry_at = %at,
                    "{reason}"
                );
                self.store
                    .schedule_retry(entry.id, worker, error.to_string(), at)
                    .await
                    .map(|()| DispatchOutcome::RetryScheduled {
                        entry: entry.id,
                        attempt: entry.attempts,
                        at,
                    })
            }
            Decision::MarkFailed { reason } => {
                tracing::error!(
                    entry_id = %entry.id,
                    aggregate_id = %entry.aggregate_id(),
                    attempt = entry.attempts,
                    "{reason}"
                );
                self.store
                    .mark_failed(entry.id, worker, reason.clone())
                    .await
                    .map(|()| DispatchOutcome::Failed {
                        entry: entry.id,
                        reason: reason.clone(),
                    })
            }
        };

        match recorded {
            Err(StoreError::LeaseLost { holder, .. }) => {
                tracing::warn!(
                    entry_id = %entry.id,
                    worker = %worker,
                    holder = %holder,
                    ?decision,
                    "lease lost before the failure was recorded"
                );
                Ok(DispatchOutcome::Superseded { entry: entry.id })
            }
            other => other,
        }
    }
}
