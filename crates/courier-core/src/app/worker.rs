use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::dispatcher::Dispatcher;
use crate::domain::WorkerId;
use crate::ports::OutboxStore;

/// Worker group handle.
/// - `request_shutdown()` で新しい claim を止める
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
/// - delivery workers に加えて retention sweep のタスクが 1 つ動く
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    sweeper: JoinHandle<()>,
}

impl WorkerGroup {
    /// Spawn `config.workers` delivery workers.
    pub fn spawn<S: OutboxStore>(dispatcher: Dispatcher<S>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let n = dispatcher.config().workers;
        let mut joins = Vec::with_capacity(n);
        for i in 0..n {
            let d = dispatcher.clone();
            let mut rx = shutdown_rx.clone();
            let worker = WorkerId::new(format!("worker-{i}"));

            let join = tokio::spawn(async move {
                worker_loop(worker, d, &mut rx).await;
            });
            joins.push(join);
        }
        let mut rx = shutdown_rx.clone();
        let sweeper = tokio::spawn(async move {
            sweep_loop(dispatcher, &mut rx).await;
        });
        tracing::info!(workers = n, "dispatcher started");

        Self {
            shutdown_tx,
            joins,
            sweeper,
        }
    }

    /// Number of delivery workers.
    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Request shutdown for all workers.
    /// In-flight deliveries are not cancelled; workers just stop claiming.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            if let Err(e) = j.await {
                tracing::error!(error = %e, "dispatcher worker panicked");
            }
        }
        if let Err(e) = self.sweeper.await {
            tracing::error!(error = %e, "retention sweeper panicked");
        }
        tracing::info!("dispatcher stopped");
    }
}

async fn worker_loop<S: OutboxStore>(
    worker: WorkerId,
    dispatcher: Dispatcher<S>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        // shutdown が来ていたら抜ける
        if *shutdown_rx.borrow() {
            break;
        }

        let wait = match dispatcher.process_one(&worker).await {
            // 続けて次を取りに行く
            Ok(Some(_)) => continue,
            Ok(None) => dispatcher.idle_wait().await,
            Err(e) => {
                tracing::warn!(worker = %worker, error = %e, "store error, backing off");
                dispatcher.config().poll_interval
            }
        };

        // idle: commit の signal、backoff 期限、shutdown のどれかで起きる
        tokio::select! {
            _ = shutdown_rx.changed() => {}
            _ = dispatcher.signal().notified() => {}
            _ = tokio::time::sleep(wait) => {}
        }
    }
    tracing::debug!(worker = %worker, "worker stopped");
}

/// Periodically prunes settled entries so the outbox does not grow forever.
async fn sweep_loop<S: OutboxStore>(
    dispatcher: Dispatcher<S>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(dispatcher.config().sweep_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown_rx.changed() => continue,
            _ = tick.tick() => {}
        }
        if let Err(e) = dispatcher.prune_settled().await {
            tracing::warn!(error = %e, "retention sweep failed");
        }
    }
    tracing::debug!("retention sweeper stopped");
}
