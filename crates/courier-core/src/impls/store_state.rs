//! StoreState - adapter 共通の状態機械
//!
//! InMemoryStore と FileStore はこの構造体をロックで包むだけです。
//! ここは I/O を持たない純粋なロジックなので、テストもここに集中させます。
//!
//! Design:
//! - `entries` is append-only and sorted by `position` (positions are only
//!   handed out at commit, under the store lock).
//! - `index` and `dedup` are derived from `entries` and rebuilt on load.
//! - `apply_commit` validates everything before touching anything.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AggregateId, DedupKey, EntryId, OutboxCounts, OutboxEntry, OutboxStatus, StateWrite,
    StoreError, StoredState, WorkerId,
};
use crate::ports::CommitReceipt;
use crate::ports::clock::add_std;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    /// `kind/aggregate_id` -> committed state.
    states: BTreeMap<String, StoredState>,

    entries: Vec<OutboxEntry>,

    next_position: u64,

    #[serde(skip)]
    index: HashMap<EntryId, usize>,

    #[serde(skip)]
    dedup: HashSet<DedupKey>,
}

fn state_key(kind: &str, id: &AggregateId) -> String {
    format!("{kind}/{id}")
}

impl StoreState {
    pub fn new() -> Self {
        Self {
            next_position: 1,
            ..Self::default()
        }
    }

    /// Restore derived lookups after deserialization.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();
        self.dedup = self.entries.iter().map(|e| e.dedup_key.clone()).collect();
        let max_position = self.entries.iter().map(|e| e.position).max().unwrap_or(0);
        self.next_position = self.next_position.max(max_position + 1);
    }

    pub fn load(&self, kind: &str, id: &AggregateId) -> Option<StoredState> {
        self.states.get(&state_key(kind, id)).cloned()
    }

    pub fn check_write(&self, write: &StateWrite) -> Result<(), StoreError> {
        let current = self
            .states
            .get(&state_key(&write.kind, &write.aggregate_id))
            .map(|s| s.version);
        if write.expected.matches(current) {
            Ok(())
        } else {
            Err(StoreError::Conflict {
                aggregate_id: write.aggregate_id.clone(),
                expected: write.expected,
                actual: current,
            })
        }
    }

    pub fn check_entries(&self, entries: &[OutboxEntry]) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for entry in entries {
            if self.dedup.contains(&entry.dedup_key) || !seen.insert(&entry.dedup_key) {
                return Err(StoreError::DuplicateKey(entry.dedup_key.clone()));
            }
        }
        Ok(())
    }

    /// Validate then apply one transaction. On `Err` nothing changed.
    pub fn apply_commit(
        &mut self,
        writes: Vec<StateWrite>,
        entries: Vec<OutboxEntry>,
        now: DateTime<Utc>,
    ) -> Result<CommitReceipt, StoreError> {
        let mut touched = HashSet::new();
        for write in &writes {
            self.check_write(write)?;
            if !touched.insert(state_key(&write.kind, &write.aggregate_id)) {
                // two writes for one aggregate: the second one's precondition is stale
                return Err(StoreError::Conflict {
                    aggregate_id: write.aggregate_id.clone(),
                    expected: write.expected,
                    actual: Some(write.expected.next_version()),
                });
            }
        }
        self.check_entries(&entries)?;

        let receipt = CommitReceipt {
            affected: writes.len(),
            staged: entries.len(),
        };

        for write in writes {
            let key = state_key(&write.kind, &write.aggregate_id);
            self.states.insert(key, write.into_stored());
        }
        for mut entry in entries {
            entry.position = self.next_position;
            entry.committed_at = Some(now);
            self.next_position += 1;
            self.dedup.insert(entry.dedup_key.clone());
            self.index.insert(entry.id, self.entries.len());
            self.entries.push(entry);
        }
        Ok(receipt)
    }

    pub fn fetch_pending(&self, limit: usize) -> Vec<OutboxEntry> {
        self.entries
            .iter()
            .filter(|e| e.status.is_pending())
            .take(limit)
            .cloned()
            .collect()
    }

    /// Index of the entry `claim_next` would take at `now`.
    fn next_claimable(&self, now: DateTime<Utc>) -> Option<usize> {
        let mut blocked: HashSet<(&str, &AggregateId)> = HashSet::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if !entry.blocks_stream() || blocked.contains(&entry.stream()) {
                continue;
            }
            // whatever happens to this entry, later ones of the stream wait
            blocked.insert(entry.stream());
            if entry.is_due(now) {
                return Some(i);
            }
        }
        None
    }

    /// Would `claim_next` hand out anything at `now`?
    pub fn has_claimable(&self, now: DateTime<Utc>) -> bool {
        self.next_claimable(now).is_some()
    }

    pub fn claim_next(
        &mut self,
        worker: &WorkerId,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Option<OutboxEntry> {
        let chosen = self.next_claimable(now)?;
        let entry = &mut self.entries[chosen];
        entry.claim(worker.clone(), add_std(now, lease), now);
        Some(entry.clone())
    }

    fn entry_mut(&mut self, id: EntryId) -> Result<&mut OutboxEntry, StoreError> {
        let i = *self.index.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(&mut self.entries[i])
    }

    fn owned_entry_mut(
        &mut self,
        id: EntryId,
        worker: &WorkerId,
        now: DateTime<Utc>,
    ) -> Result<&mut OutboxEntry, StoreError> {
        let entry = self.entry_mut(id)?;
        if !entry.is_owned_by(worker, now) {
            let holder = entry
                .lease
                .as_ref()
                .map(|l| l.owner.clone())
                .unwrap_or_else(|| worker.clone());
            return Err(StoreError::LeaseLost { entry: id, holder });
        }
        Ok(entry)
    }

    pub fn mark_dispatched(
        &mut self,
        id: EntryId,
        worker: &WorkerId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if self.entry_mut(id)?.status.is_dispatched() {
            return Ok(false);
        }
        let entry = self.owned_entry_mut(id, worker, now)?;
        match &entry.status {
            OutboxStatus::Pending => {
                entry.mark_dispatched(now);
                Ok(true)
            }
            other => Err(StoreError::InvalidTransition {
                entry: id,
                action: "be dispatched",
                detail: format!("{other:?}"),
            }),
        }
    }

    pub fn schedule_retry(
        &mut self,
        id: EntryId,
        worker: &WorkerId,
        reason: String,
        next_attempt_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let entry = self.owned_entry_mut(id, worker, now)?;
        if !entry.status.is_pending() {
            return Err(StoreError::InvalidTransition {
                entry: id,
                action: "schedule a retry",
                detail: format!("{:?}", entry.status),
            });
        }
        entry.schedule_retry(next_attempt_at, reason);
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        id: EntryId,
        worker: &WorkerId,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let entry = self.owned_entry_mut(id, worker, now)?;
        if !entry.status.is_pending() {
            return Err(StoreError::InvalidTransition {
                entry: id,
                action: "be marked failed",
                detail: format!("{:?}", entry.status),
            });
        }
        entry.mark_failed(reason);
        Ok(())
    }

    pub fn replay(&mut self, id: EntryId) -> Result<(), StoreError> {
        let entry = self.entry_mut(id)?;
        match &entry.status {
            OutboxStatus::Failed { .. } => {
                entry.replay();
                Ok(())
            }
            other => Err(StoreError::InvalidTransition {
                entry: id,
                action: "be replayed",
                detail: format!("{other:?}"),
            }),
        }
    }

    pub fn abandon(&mut self, id: EntryId) -> Result<(), StoreError> {
        let entry = self.entry_mut(id)?;
        match &entry.status {
            OutboxStatus::Failed { .. } => {
                entry.abandon();
                Ok(())
            }
            other => Err(StoreError::InvalidTransition {
                entry: id,
                action: "be abandoned",
                detail: format!("{other:?}"),
            }),
        }
    }

    pub fn get(&self, id: EntryId) -> Option<OutboxEntry> {
        self.index.get(&id).map(|&i| self.entries[i].clone())
    }

    pub fn next_due_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .filter(|e| e.status.is_pending())
            .filter_map(|e| {
                let lease_end = e.lease.as_ref().map(|l| l.expires_at);
                match (e.next_attempt_at, lease_end) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                }
            })
            .filter(|at| *at > now)
            .min()
    }

    /// Drop Dispatched and abandoned entries that settled at or before
    /// `cutoff`. Their dedup keys are forgotten with them.
    pub fn prune_settled(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.settled_before(cutoff));
        let pruned = before - self.entries.len();
        if pruned > 0 {
            self.rebuild_index();
        }
        pruned
    }

    pub fn counts(&self, now: DateTime<Utc>) -> OutboxCounts {
        OutboxCounts::tally(&self.entries, now)
    }

    /// Process restart: claims held by dead workers disappear.
    pub fn release_leases(&mut self) {
        for entry in &mut self.entries {
            entry.lease = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::fixtures::Deposited;
    use crate::domain::{EventRecord, ExpectedVersion};
    use chrono::TimeZone;
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    const LEASE: Duration = Duration::from_secs(30);

    fn entry(aggregate: &str, sequence: u64) -> OutboxEntry {
        entry_of("account", aggregate, sequence)
    }

    fn entry_of(kind: &str, aggregate: &str, sequence: u64) -> OutboxEntry {
        let record = EventRecord::encode(
            AggregateId::new(aggregate),
            kind,
            &Deposited {
                amount: sequence as i64,
                at: t0(),
            },
            sequence,
        )
        .unwrap();
        OutboxEntry::pending(EntryId::from_ulid(Ulid::new()), record)
    }

    fn write(aggregate: &str, expected: ExpectedVersion) -> StateWrite {
        StateWrite {
            kind: "account".into(),
            aggregate_id: AggregateId::new(aggregate),
            expected,
            sequence: 0,
            body: serde_json::json!({}),
        }
    }

    fn committed(entries: Vec<OutboxEntry>) -> StoreState {
        let mut state = StoreState::new();
        state.apply_commit(vec![], entries, t0()).unwrap();
        state
    }

    #[test]
    fn commit_assigns_increasing_positions_in_buffer_order() {
        let state = committed(vec![entry("A", 1), entry("A", 2), entry("B", 1)]);
        let positions: Vec<u64> = state.fetch_pending(10).iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(state.fetch_pending(10).iter().all(|e| e.committed_at == Some(t0())));
    }

    #[test]
    fn failed_validation_leaves_state_untouched() {
        let mut state = StoreState::new();
        state
            .apply_commit(vec![write("A", ExpectedVersion::Absent)], vec![], t0())
            .unwrap();

        let err = state
            .apply_commit(
                vec![
                    write("B", ExpectedVersion::Absent),
                    write("A", ExpectedVersion::Absent),
                ],
                vec![entry("B", 1)],
                t0(),
            )
            .unwrap_err();

        assert!(err.is_conflict());
        assert!(state.load("account", &AggregateId::new("B")).is_none());
        assert!(state.fetch_pending(10).is_empty());
    }

    #[test]
    fn duplicate_dedup_keys_are_rejected() {
        let mut state = committed(vec![entry("A", 1)]);
        let err = state
            .apply_commit(vec![], vec![entry("A", 1)], t0())
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));

        let err = state
            .apply_commit(vec![], vec![entry("B", 1), entry("B", 1)], t0())
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[test]
    fn claim_respects_per_aggregate_order() {
        let mut state = committed(vec![entry("A", 1), entry("A", 2), entry("B", 1)]);
        let w1 = WorkerId::new("w1");
        let w2 = WorkerId::new("w2");
        let w3 = WorkerId::new("w3");

        let first = state.claim_next(&w1, LEASE, t0()).unwrap();
        assert_eq!((first.aggregate_id().as_str(), first.sequence()), ("A", 1));

        // A#2 is held back while A#1 is in flight; B is independent
        let second = state.claim_next(&w2, LEASE, t0()).unwrap();
        assert_eq!((second.aggregate_id().as_str(), second.sequence()), ("B", 1));
        assert!(state.claim_next(&w3, LEASE, t0()).is_none());

        assert!(state.mark_dispatched(first.id, &w1, t0()).unwrap());
        let third = state.claim_next(&w3, LEASE, t0()).unwrap();
        assert_eq!((third.aggregate_id().as_str(), third.sequence()), ("A", 2));
    }

    #[test]
    fn streams_are_per_kind_and_id() {
        let mut state = committed(vec![entry_of("order", "1", 1), entry_of("order", "1", 2)]);
        state
            .apply_commit(vec![], vec![entry_of("customer", "1", 1)], t0())
            .unwrap();
        let w = WorkerId::new("w");

        let first = state.claim_next(&w, LEASE, t0()).unwrap();
        assert_eq!(first.stream().0, "order");
        // order/1#2 waits; customer/1 is a different stream
        let second = state.claim_next(&w, LEASE, t0()).unwrap();
        assert_eq!(second.stream().0, "customer");
        assert!(state.claim_next(&w, LEASE, t0()).is_none());
    }

    #[test]
    fn backoff_blocks_only_its_own_aggregate() {
        let mut state = committed(vec![entry("A", 1), entry("A", 2), entry("B", 1)]);
        let w = WorkerId::new("w");

        let a1 = state.claim_next(&w, LEASE, t0()).unwrap();
        state
            .schedule_retry(a1.id, &w, "503".into(), t0() + secs(10), t0())
            .unwrap();

        let next = state.claim_next(&w, LEASE, t0()).unwrap();
        assert_eq!(next.aggregate_id().as_str(), "B");
        assert!(state.claim_next(&w, LEASE, t0()).is_none());
        assert_eq!(state.next_due_at(t0()), Some(t0() + secs(10)));

        let again = state.claim_next(&w, LEASE, t0() + secs(10)).unwrap();
        assert_eq!(again.id, a1.id);
        assert_eq!(again.attempts, 2);
    }

    #[test]
    fn expired_lease_allows_redelivery_and_fences_old_owner() {
        let mut state = committed(vec![entry("A", 1)]);
        let w1 = WorkerId::new("w1");
        let w2 = WorkerId::new("w2");

        let claimed = state.claim_next(&w1, LEASE, t0()).unwrap();
        assert!(state.claim_next(&w2, LEASE, t0() + secs(29)).is_none());

        let reclaimed = state.claim_next(&w2, LEASE, t0() + secs(31)).unwrap();
        assert_eq!(reclaimed.id, claimed.id);
        assert_eq!(reclaimed.attempts, 2);

        let err = state
            .mark_dispatched(claimed.id, &w1, t0() + secs(32))
            .unwrap_err();
        assert!(matches!(err, StoreError::LeaseLost { holder, .. } if holder == w2));
    }

    #[test]
    fn mark_dispatched_twice_is_a_noop() {
        let mut state = committed(vec![entry("A", 1)]);
        let w = WorkerId::new("w");
        let claimed = state.claim_next(&w, LEASE, t0()).unwrap();

        assert!(state.mark_dispatched(claimed.id, &w, t0()).unwrap());
        assert!(!state.mark_dispatched(claimed.id, &w, t0()).unwrap());
        assert_eq!(state.counts(t0()).dispatched, 1);
    }

    #[test]
    fn failed_entry_blocks_stream_until_replay_or_abandon() {
        let mut state = committed(vec![entry("A", 1), entry("A", 2)]);
        let w = WorkerId::new("w");

        let a1 = state.claim_next(&w, LEASE, t0()).unwrap();
        state.mark_failed(a1.id, &w, "poison".into(), t0()).unwrap();
        assert!(state.claim_next(&w, LEASE, t0()).is_none());

        state.replay(a1.id).unwrap();
        let again = state.claim_next(&w, LEASE, t0()).unwrap();
        assert_eq!(again.id, a1.id);
        assert_eq!(again.attempts, 1);

        state.mark_failed(a1.id, &w, "poison".into(), t0()).unwrap();
        state.abandon(a1.id).unwrap();
        let a2 = state.claim_next(&w, LEASE, t0()).unwrap();
        assert_eq!(a2.sequence(), 2);
        assert_eq!(state.counts(t0()).abandoned, 1);
    }

    #[test]
    fn prune_drops_only_settled_entries_past_the_cutoff() {
        let mut state = committed(vec![entry("A", 1), entry("B", 1), entry("C", 1), entry("D", 1)]);
        let w = WorkerId::new("w");

        let a = state.claim_next(&w, LEASE, t0()).unwrap();
        state.mark_dispatched(a.id, &w, t0()).unwrap();
        let b = state.claim_next(&w, LEASE, t0()).unwrap();
        state.mark_failed(b.id, &w, "poison".into(), t0()).unwrap();
        state.abandon(b.id).unwrap();
        let c = state.claim_next(&w, LEASE, t0() + secs(60)).unwrap();
        state.mark_dispatched(c.id, &w, t0() + secs(60)).unwrap();

        assert_eq!(state.prune_settled(t0() + secs(30)), 2);
        assert!(state.get(a.id).is_none());
        assert!(state.get(b.id).is_none());
        assert!(state.get(c.id).is_some());

        // D is untouched and still claimable through the rebuilt index
        let d = state.claim_next(&w, LEASE, t0() + secs(60)).unwrap();
        assert_eq!(d.aggregate_id().as_str(), "D");
        assert!(state.mark_dispatched(d.id, &w, t0() + secs(60)).unwrap());
        assert_eq!(state.counts(t0() + secs(60)).dispatched, 2);
    }

    #[test]
    fn has_claimable_matches_claim_next() {
        let mut state = committed(vec![entry("A", 1)]);
        let w = WorkerId::new("w");
        assert!(state.has_claimable(t0()));
        state.claim_next(&w, LEASE, t0()).unwrap();
        assert!(!state.has_claimable(t0()));
        assert!(state.has_claimable(t0() + secs(31)));
    }

    #[test]
    fn replay_requires_failed_status() {
        let mut state = committed(vec![entry("A", 1)]);
        let id = state.fetch_pending(1)[0].id;
        assert!(matches!(
            state.replay(id),
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn serde_roundtrip_rebuilds_index() {
        let state = committed(vec![entry("A", 1), entry("A", 2)]);
        let id = state.fetch_pending(1)[0].id;

        let json = serde_json::to_string(&state).unwrap();
        let mut restored: StoreState = serde_json::from_str(&json).unwrap();
        restored.rebuild_index();

        assert_eq!(restored.get(id).map(|e| e.id), Some(id));
        assert!(matches!(
            restored.apply_commit(vec![], vec![entry("A", 2)], t0()),
            Err(StoreError::DuplicateKey(_))
        ));
        restored.apply_commit(vec![], vec![entry("A", 3)], t0()).unwrap();
        assert_eq!(restored.fetch_pending(10).last().map(|e| e.position), Some(3));
    }
}
