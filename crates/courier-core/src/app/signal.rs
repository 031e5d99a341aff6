//! DispatchSignal - commit 後に dispatcher を起こす
//!
//! Purely a latency optimisation: workers also poll, so a lost wake-up only
//! delays delivery by one poll interval.

use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Clone, Default)]
pub struct DispatchSignal {
    notify: Arc<Notify>,
}

impl DispatchSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every idle worker; if none is waiting, the next wait returns
    /// immediately.
    pub fn notify(&self) {
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
