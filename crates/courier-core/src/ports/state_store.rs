//! TransactionalStore port - 状態と outbox の正本（source of truth）
//!
//! # 設計原則
//! - 状態の書き込みと outbox への stage は同一トランザクション内
//! - `commit()` が point of no return。それ以前の失敗は何も残さない
//! - stage は `StoreTransaction` からしか呼べない

use async_trait::async_trait;

use crate::domain::{AggregateId, OutboxEntry, StateWrite, StoreError, StoredState};

/// Result of a durable commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    /// State records written.
    pub affected: usize,

    /// Outbox entries staged.
    pub staged: usize,
}

#[async_trait]
pub trait TransactionalStore: Send + Sync + 'static {
    type Transaction: StoreTransaction;

    /// Read the committed state of one aggregate.
    async fn load(&self, kind: &str, id: &AggregateId) -> Result<Option<StoredState>, StoreError>;

    /// Open a transaction. Nothing is visible to readers until `commit`.
    async fn begin(&self) -> Result<Self::Transaction, StoreError>;
}

#[async_trait]
pub trait StoreTransaction: Send + Sized {
    /// Stage a state mutation. Adapters may reject stale preconditions early
    /// but must re-check them inside `commit`.
    async fn write_state(&mut self, write: StateWrite) -> Result<(), StoreError>;

    /// Stage outbox entries in capture order.
    async fn stage(&mut self, entries: Vec<OutboxEntry>) -> Result<(), StoreError>;

    /// All-or-nothing: either every write and entry becomes durable or none.
    async fn commit(self) -> Result<CommitReceipt, StoreError>;

    async fn rollback(self);
}
