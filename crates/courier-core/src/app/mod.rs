//! App - アプリケーション層
//!
//! ports を組み合わせて outbox パターンを実装します。
//!
//! # 主要コンポーネント
//! - **UnitOfWork**: 状態変更 + outbox stage を 1 トランザクションで commit
//! - **Dispatcher**: claim → deliver → decide → mark
//! - **WorkerGroup**: Dispatcher のワーカープール
//! - **DispatcherBuilder**: 起動時検証つきのワイヤリング
//! - **DispatchSignal**: commit 後に idle なワーカーを起こす

pub mod builder;
pub mod dispatcher;
pub mod signal;
pub mod status;
pub mod unit_of_work;
pub mod worker;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, DispatcherBuilder};
pub use self::dispatcher::{DispatchOutcome, Dispatcher};
pub use self::signal::DispatchSignal;
pub use self::status::Status;
pub use self::unit_of_work::UnitOfWork;
pub use self::worker::WorkerGroup;
