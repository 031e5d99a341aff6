//! Status - dispatcher の状態スナップショット
//!
//! 詰まり（failed / backoff）を説明するための読み取り専用ビュー。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::OutboxCounts;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub counts: OutboxCounts,

    /// When the next backed-off or leased entry becomes claimable.
    pub next_due_at: Option<DateTime<Utc>>,

    pub subscribed_types: Vec<String>,
}

impl Status {
    /// Entries need an operator (`replay` / `abandon`).
    pub fn needs_attention(&self) -> bool {
        self.counts.failed > 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counts;
        write!(
            f,
            "pending={} in_flight={} retry_scheduled={} dispatched={} failed={} abandoned={}",
            c.pending, c.in_flight, c.retry_scheduled, c.dispatched, c.failed, c.abandoned
        )?;
        if let Some(at) = self.next_due_at {
            write!(f, " next_due_at={}", at.to_rfc3339())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_bucket() {
        let status = Status {
            counts: OutboxCounts {
                dispatched: 3,
                failed: 1,
                ..OutboxCounts::default()
            },
            next_due_at: None,
            subscribed_types: vec![],
        };
        assert_eq!(
            status.to_string(),
            "pending=0 in_flight=0 retry_scheduled=0 dispatched=3 failed=1 abandoned=0"
        );
        assert!(status.needs_attention());
    }
}
