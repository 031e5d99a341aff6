//! DispatcherBuilder - dispatcher の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `expect_events()` で配送先が必須の event type を宣言
//! - `build()` 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - config も `build()` で検証する

use std::sync::Arc;

use crate::app::dispatcher::Dispatcher;
use crate::app::signal::DispatchSignal;
use crate::config::{ConfigError, DispatcherConfig};
use crate::domain::{Decider, DefaultDecider, Event};
use crate::ports::{Clock, OutboxStore, SystemClock};
use crate::typed::{Handler, RegistryError, Subscriptions};

/// # 使用例
/// ```ignore
/// let dispatcher = DispatcherBuilder::new(store)
///     .config(config)
///     .subscribe::<OrderPlaced, _>("receipts", SendReceipt)?
///     .expect_events(&[OrderPlaced::TYPE])
///     .build()?;
/// let workers = dispatcher.spawn();
/// ```
pub struct DispatcherBuilder<S: OutboxStore> {
    store: Arc<S>,
    subscriptions: Subscriptions,
    config: DispatcherConfig,
    decider: Option<Arc<dyn Decider>>,
    clock: Arc<dyn Clock>,
    signal: DispatchSignal,
    expected_events: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing subscribers for event types: {0:?}. These events were expected but nobody consumes them.")]
    MissingEventTypes(Vec<String>),

    #[error("invalid dispatcher config: {0}")]
    Config(#[from] ConfigError),
}

impl<S: OutboxStore> DispatcherBuilder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            subscriptions: Subscriptions::new(),
            config: DispatcherConfig::default(),
            decider: None,
            clock: Arc::new(SystemClock),
            signal: DispatchSignal::new(),
            expected_events: None,
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to `DefaultDecider` over `config.retry`.
    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    /// Must be the clock the store uses, or leases and backoff disagree.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share one signal with the units of work that feed this dispatcher.
    pub fn signal(mut self, signal: DispatchSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn subscribe<E: Event, H: Handler<E> + 'static>(
        mut self,
        name: impl Into<String>,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.subscriptions.subscribe::<E, H>(name, handler)?;
        Ok(self)
    }

    /// Replace the subscription list wholesale.
    pub fn subscriptions(mut self, subscriptions: Subscriptions) -> Self {
        self.subscriptions = subscriptions;
        self
    }

    pub fn expect_events(mut self, event_types: &[&str]) -> Self {
        self.expected_events = Some(event_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Dispatcher<S>, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_events {
            let registered: Vec<String> = self
                .subscriptions
                .registered_types()
                .into_iter()
                .map(|t| t.as_str().to_string())
                .collect();
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !registered.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingEventTypes(missing));
            }
        }

        let decider = self
            .decider
            .unwrap_or_else(|| Arc::new(DefaultDecider::new(self.config.retry.clone())));
        Ok(Dispatcher::new(
            self.store,
            self.subscriptions,
            decider,
            self.clock,
            self.config,
            self.signal,
        ))
    }
}
