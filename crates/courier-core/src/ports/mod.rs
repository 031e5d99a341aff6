//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 具体的な adapter（InMemory, File など）はプロセス起動時に選びます。

pub mod clock;
pub mod consumer;
pub mod id_generator;
pub mod outbox_store;
pub mod state_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::consumer::{Consumer, Delivery};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::outbox_store::OutboxStore;
pub use self::state_store::{CommitReceipt, StoreTransaction, TransactionalStore};
