mod config;
mod demo;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use courier_core::impls::{FileStore, IdempotentConsumer, InMemoryStore};
use courier_core::ports::{OutboxStore, TransactionalStore};
use courier_core::typed::TypedHandler;
use courier_core::{
    DispatchSignal, DispatcherBuilder, Event, EventType, Subscriptions, UnitOfWork,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{CliConfig, StoreChoice};
use crate::demo::{Order, OrderEvent, Receipts, Timeline};

fn init_tracing() {
    let log_format = std::env::var("COURIER_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,courier_core=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::from_env()?;
    init_tracing();

    match config.store.clone() {
        StoreChoice::Memory => {
            tracing::info!("using in-memory store");
            run(InMemoryStore::new(), config).await
        }
        StoreChoice::File(path) => {
            let store = FileStore::open(&path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            tracing::info!(path = %path.display(), "using file store");
            run(store, config).await
        }
    }
}

async fn run<S>(store: S, config: CliConfig) -> anyhow::Result<()>
where
    S: TransactionalStore + OutboxStore + Clone,
{
    // (A) subscriptions: timeline -> receipts（同じ entry への再配送は dedup で無視）
    let event_type = EventType::of::<OrderEvent>();
    let mut subs = Subscriptions::new();
    subs.subscribe_consumer(
        event_type.clone(),
        Arc::new(IdempotentConsumer::new(Arc::new(TypedHandler::<OrderEvent, _>::new(
            "timeline", Timeline,
        )))),
    )?;
    subs.subscribe_consumer(
        event_type,
        Arc::new(IdempotentConsumer::new(Arc::new(TypedHandler::<OrderEvent, _>::new(
            "receipts",
            Receipts::new(config.demo_failures),
        )))),
    )?;

    // (B) dispatcher を起動
    let signal = DispatchSignal::new();
    let dispatcher = DispatcherBuilder::new(Arc::new(store.clone()))
        .config(config.dispatcher.clone())
        .signal(signal.clone())
        .subscriptions(subs)
        .expect_events(&[OrderEvent::TYPE])
        .build()?;
    let workers = dispatcher.spawn();

    // (C) unit of work ごとに 1 注文
    let cancel = CancellationToken::new();
    for n in 1..=3 {
        let mut uow = UnitOfWork::begin(store.clone()).with_signal(signal.clone());
        let mut order = Order::new(format!("order-{n}-{}", Utc::now().timestamp_millis()));
        uow.add(&order)?;
        uow.raise(
            &mut order,
            OrderEvent::Placed {
                customer: format!("customer-{n}"),
                at: Utc::now(),
            },
        )?;
        for sku in ["tea", "cups"] {
            uow.raise(
                &mut order,
                OrderEvent::LineAdded {
                    sku: sku.into(),
                    qty: n,
                    at: Utc::now(),
                },
            )?;
        }
        uow.raise(&mut order, OrderEvent::Confirmed { at: Utc::now() })?;
        let affected = uow.save_changes(&cancel).await?;
        tracing::info!(order = %order.id, affected, "order committed");
    }

    // (D) 配送が落ち着くまで待つ
    let retry = &config.dispatcher.retry;
    let budget = retry
        .max_delay
        .saturating_mul(retry.max_attempts)
        .saturating_add(Duration::from_secs(5));
    let settled = tokio::time::timeout(budget, async {
        loop {
            match dispatcher.counts().await {
                Ok(counts) if counts.is_settled() => break,
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "could not read outbox counts"),
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    if settled.is_err() {
        tracing::warn!(?budget, "outbox did not settle in time");
    }

    let status = dispatcher.status().await?;
    println!("outbox: {status}");
    workers.shutdown_and_join().await;

    if status.needs_attention() {
        anyhow::bail!("{} outbox entries failed and need replay", status.counts.failed);
    }
    Ok(())
}
