//! Decision model: what the dispatcher does after a failed delivery.
//!
//! The Decider is a pure function of (entry, error); executing the decision
//! (store update, logging) is the dispatcher's job.

use std::time::Duration;

use super::errors::{DeliveryError, ErrorKind};
use super::outbox::OutboxEntry;
use super::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Leave the entry Pending and retry after `delay`.
    Retry { delay: Duration, reason: String },

    /// Give up: the entry becomes Failed and waits for an operator.
    MarkFailed { reason: String },
}

pub trait Decider: Send + Sync {
    /// `entry.attempts` already includes the attempt that just failed.
    fn decide(&self, entry: &OutboxEntry, error: &DeliveryError) -> Decision;
}

/// Attempt-based retry with exponential backoff; permanent errors fail
/// right away.
#[derive(Debug, Clone, Default)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, entry: &OutboxEntry, error: &DeliveryError) -> Decision {
        if error.kind() == ErrorKind::Permanent {
            return Decision::MarkFailed {
                reason: format!("permanent error: {error}"),
            };
        }

        if self.retry_policy.is_exhausted(entry.attempts) {
            Decision::MarkFailed {
                reason: format!(
                    "max attempts reached ({}/{}): {error}",
                    entry.attempts, self.retry_policy.max_attempts
                ),
            }
        } else {
            let delay = self.retry_policy.next_delay(entry.attempts);
            Decision::Retry {
                delay,
                reason: format!(
                    "retry attempt {}/{} after {:?}: {error}",
                    entry.attempts + 1,
                    self.retry_policy.max_attempts,
                    delay
                ),
            }
        }
    }
}
