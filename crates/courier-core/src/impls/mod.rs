//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryStore**: 開発用・テスト用の正本（fault injection 付き）
//! - **FileStore**: JSON スナップショットによる永続化
//! - **IdempotentConsumer**: DedupKey による consumer 側の重複排除
//!
//! Both stores share `StoreState`, so ordering and lease rules cannot drift
//! between adapters.

pub mod dedup;
pub mod file_store;
pub mod inmem_store;
pub mod store_state;

pub use self::dedup::IdempotentConsumer;
pub use self::file_store::{FileStore, FileTransaction};
pub use self::inmem_store::{FaultPoint, InMemoryStore, InMemoryTransaction};
pub use self::store_state::StoreState;
