//! Aggregate contract and the persisted state shapes the unit of work writes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::Event;
use super::ids::AggregateId;

/// Aggregate は状態変更でイベントを発生させる整合性境界
///
/// `apply` is the only place state changes as a consequence of an event, so
/// a raised event and the state it produced always travel together.
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Storage namespace, e.g. `"order"`.
    const KIND: &'static str;

    type Event: Event;

    fn id(&self) -> AggregateId;

    fn apply(&mut self, event: &Self::Event);
}

/// Committed state of one aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    pub kind: String,
    pub aggregate_id: AggregateId,

    /// Optimistic concurrency counter, bumped once per commit.
    pub version: u64,

    /// Last event sequence committed for this aggregate.
    pub sequence: u64,

    pub body: serde_json::Value,
}

/// Precondition a state write carries into the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// The aggregate must not exist yet.
    Absent,
    Exactly(u64),
}

impl ExpectedVersion {
    pub fn matches(self, current: Option<u64>) -> bool {
        match (self, current) {
            (ExpectedVersion::Absent, None) => true,
            (ExpectedVersion::Exactly(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }

    pub fn next_version(self) -> u64 {
        match self {
            ExpectedVersion::Absent => 1,
            ExpectedVersion::Exactly(v) => v + 1,
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedVersion::Absent => f.write_str("absent"),
            ExpectedVersion::Exactly(v) => write!(f, "v{v}"),
        }
    }
}

/// One state mutation staged in a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateWrite {
    pub kind: String,
    pub aggregate_id: AggregateId,
    pub expected: ExpectedVersion,
    pub sequence: u64,
    pub body: serde_json::Value,
}

impl StateWrite {
    pub fn into_stored(self) -> StoredState {
        StoredState {
            version: self.expected.next_version(),
            kind: self.kind,
            aggregate_id: self.aggregate_id,
            sequence: self.sequence,
            body: self.body,
        }
    }
}
