//! courier-core
//!
//! Transactional outbox: a unit of work commits aggregate state and the
//! events it raised in one step, and a dispatcher delivers those events
//! at-least-once, in per-aggregate order, to subscribed consumers.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, event, capture buffer, outbox entry, retry, decision, errors）
//! - **ports**: 抽象化レイヤー（TransactionalStore, OutboxStore, Consumer, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryStore, FileStore, IdempotentConsumer）
//! - **typed**: 型付き subscription API（Handler trait, Subscriptions）
//! - **app**: アプリケーションロジック（UnitOfWork, Dispatcher, WorkerGroup, DispatcherBuilder）
//! - **config**: DispatcherConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{
    BuildError, DispatchOutcome, DispatchSignal, Dispatcher, DispatcherBuilder, Status,
    UnitOfWork, WorkerGroup,
};
pub use config::{ConfigError, DispatcherConfig};
pub use domain::{
    Aggregate, AggregateId, DedupKey, DeliveryError, EntryId, Event, EventRecord, EventType,
    OutboxCounts, OutboxEntry, OutboxStatus, RetryPolicy, StoreError, UnitOfWorkError, WorkerId,
};
pub use typed::{Handler, Subscriptions};
