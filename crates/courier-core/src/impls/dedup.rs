//! IdempotentConsumer - consumer 側の重複排除
//!
//! The dispatcher is at-least-once. Wrapping a consumer here turns a
//! redelivered entry (same `DedupKey`) into a no-op. A duplicate that
//! arrives while the first delivery is still running fails transiently and
//! is retried later.
//!
//! Keys are remembered in process memory only. A consumer whose effects must
//! survive restarts should record the key in its own transaction instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{DedupKey, DeliveryError};
use crate::ports::{Consumer, Delivery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InFlight,
    Done,
}

pub struct IdempotentConsumer {
    inner: Arc<dyn Consumer>,
    marks: Mutex<HashMap<DedupKey, Mark>>,
}

impl IdempotentConsumer {
    pub fn new(inner: Arc<dyn Consumer>) -> Self {
        Self {
            inner,
            marks: Mutex::new(HashMap::new()),
        }
    }

    /// 成功済みの key か
    pub fn has_seen(&self, key: &DedupKey) -> bool {
        self.marks().get(key) == Some(&Mark::Done)
    }

    pub fn seen_count(&self) -> usize {
        self.marks().values().filter(|m| **m == Mark::Done).count()
    }

    // never held across an await; a poisoned map is still consistent
    fn marks(&self) -> MutexGuard<'_, HashMap<DedupKey, Mark>> {
        self.marks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the in-flight mark unless the delivery succeeded, including when
/// the delivery future is dropped by a timeout.
struct Claim<'a> {
    owner: &'a IdempotentConsumer,
    key: &'a DedupKey,
    done: bool,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut marks = self.owner.marks();
        if self.done {
            marks.insert(self.key.clone(), Mark::Done);
        } else {
            marks.remove(self.key);
        }
    }
}

#[async_trait]
impl Consumer for IdempotentConsumer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn deliver(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        let key = &delivery.dedup_key;
        // check と mark を同じ lock の中で
        let previous = {
            let mut marks = self.marks();
            let previous = marks.get(key).copied();
            if previous.is_none() {
                marks.insert(key.clone(), Mark::InFlight);
            }
            previous
        };
        match previous {
            Some(Mark::Done) => {
                tracing::debug!(
                    consumer = self.name(),
                    dedup_key = %key,
                    attempt = delivery.attempt,
                    "duplicate delivery skipped"
                );
                return Ok(());
            }
            Some(Mark::InFlight) => {
                tracing::debug!(
                    consumer = self.name(),
                    dedup_key = %key,
                    "same key already in flight"
                );
                return Err(DeliveryError::Transient(format!(
                    "delivery of {key} already in flight"
                )));
            }
            None => {}
        }

        let mut claim = Claim {
            owner: self,
            key,
            done: false,
        };
        self.inner.deliver(delivery).await?;
        claim.done = true;
        Ok(())
    }
}
