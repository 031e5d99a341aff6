//! Errors - エラー型と分類
//!
//! - `UnitOfWorkError`: commit 側（呼び出し元に返す）
//! - `StoreError`: storage adapter が返す
//! - `DeliveryError`: consumer が返す（dispatcher がリトライ判断）

use std::time::Duration;

use thiserror::Error;

use super::aggregate::ExpectedVersion;
use super::event::DedupKey;
use super::ids::{AggregateId, EntryId, WorkerId};

/// ErrorKind は配送エラーの分類
///
/// - Transient: 一時的なエラー（リトライ推奨）
/// - Permanent: 恒久的なエラー（リトライ無意味）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict on {aggregate_id}: expected {expected}, found {actual:?}")]
    Conflict {
        aggregate_id: AggregateId,
        expected: ExpectedVersion,
        actual: Option<u64>,
    },

    #[error("dedup key {0} is already staged")]
    DuplicateKey(DedupKey),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("outbox entry {0} not found")]
    NotFound(EntryId),

    #[error("lease on {entry} is held by {holder}")]
    LeaseLost { entry: EntryId, holder: WorkerId },

    #[error("outbox entry {entry} cannot {action}: {detail}")]
    InvalidTransition {
        entry: EntryId,
        action: &'static str,
        detail: String,
    },

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::DuplicateKey(_))
    }
}

/// Failure of `UnitOfWork::save_changes` (and its session helpers).
#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    /// Another writer got there first. Retry with freshly loaded state.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(#[source] StoreError),

    /// Abandoned before the point of no return. Nothing became durable.
    #[error("unit of work cancelled before commit")]
    Cancelled,

    /// Transport/durability layer failed. Not retried here.
    #[error("storage failure: {0}")]
    StorageFailure(#[source] StoreError),

    #[error("aggregate {0} is not tracked by this unit of work")]
    Untracked(AggregateId),

    #[error("aggregate {0} is already tracked by this unit of work")]
    AlreadyTracked(AggregateId),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<StoreError> for UnitOfWorkError {
    fn from(err: StoreError) -> Self {
        if err.is_conflict() {
            UnitOfWorkError::ConcurrencyConflict(err)
        } else {
            UnitOfWorkError::StorageFailure(err)
        }
    }
}

/// Failure reported by a consumer for one delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transient delivery failure: {0}")]
    Transient(String),

    #[error("permanent delivery failure: {0}")]
    Permanent(String),

    #[error("payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

impl DeliveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeliveryError::Transient(_) | DeliveryError::Timeout(_) => ErrorKind::Transient,
            // a payload that does not decode now never will
            DeliveryError::Permanent(_) | DeliveryError::Decode(_) => ErrorKind::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn conflicts_map_to_concurrency_conflict() {
        let err: UnitOfWorkError = StoreError::Conflict {
            aggregate_id: AggregateId::new("a"),
            expected: ExpectedVersion::Exactly(1),
            actual: Some(2),
        }
        .into();
        assert!(matches!(err, UnitOfWorkError::ConcurrencyConflict(_)));

        let err: UnitOfWorkError = StoreError::DuplicateKey(DedupKey::explicit("k")).into();
        assert!(matches!(err, UnitOfWorkError::ConcurrencyConflict(_)));
    }

    #[test]
    fn other_store_errors_map_to_storage_failure() {
        let err: UnitOfWorkError = StoreError::Unavailable("disk gone".into()).into();
        assert!(matches!(err, UnitOfWorkError::StorageFailure(_)));
        assert!(err.to_string().contains("disk gone"));
    }

    #[rstest]
    #[case::transient(DeliveryError::Transient("x".into()), ErrorKind::Transient)]
    #[case::timeout(DeliveryError::Timeout(Duration::from_secs(1)), ErrorKind::Transient)]
    #[case::permanent(DeliveryError::Permanent("x".into()), ErrorKind::Permanent)]
    fn delivery_errors_are_classified(#[case] err: DeliveryError, #[case] kind: ErrorKind) {
        assert_eq!(err.kind(), kind);
    }
}
