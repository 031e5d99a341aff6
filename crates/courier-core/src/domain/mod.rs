//! Domain model (IDs, events, capture buffer, outbox entries, policies).
//!
//! 副作用なし: I/O は ports / impls に置く。

pub mod aggregate;
pub mod capture;
pub mod contracts;
pub mod decision;
pub mod errors;
pub mod event;
pub mod ids;
pub mod outbox;
pub mod retry;

pub use aggregate::{Aggregate, ExpectedVersion, StateWrite, StoredState};
pub use capture::CaptureBuffer;
pub use contracts::{PageLinks, PageMeta, Paginated, ResetToken, SetDueDateRequest};
pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{DeliveryError, ErrorKind, StoreError, UnitOfWorkError};
pub use event::{DedupKey, Event, EventRecord, EventType};
pub use ids::{AggregateId, EntryId, SessionId, WorkerId};
pub use outbox::{Lease, OutboxCounts, OutboxEntry, OutboxStatus};
pub use retry::RetryPolicy;
