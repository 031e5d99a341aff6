//! Retry policy: decides backoff delays and the attempt budget.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::duration_ms;

/// Retry policy for failed deliveries.
///
/// delay = min(base_delay * multiplier^(attempts - 1), max_delay), then an
/// optional +/- jitter ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    #[serde(with = "duration_ms", rename = "base_delay_ms")]
    pub base_delay: Duration,

    pub multiplier: f64,

    /// Backoff cap.
    #[serde(with = "duration_ms", rename = "max_delay_ms")]
    pub max_delay: Duration,

    /// Attempts (including the first) before an entry is marked Failed.
    pub max_attempts: u32,

    /// 0.0 disables jitter; 0.2 spreads delays by +/-20%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(300),
            max_attempts: 5,
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given the attempts already made
    /// (1-indexed).
    ///
    /// Example with base_delay=2s, multiplier=2.0, max_delay=10s:
    /// - attempt 1: 2s
    /// - attempt 2: 4s
    /// - attempt 3: 8s
    /// - attempt 4: 10s (capped)
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let cap = self.max_delay.as_secs_f64();
        let capped = if raw.is_finite() { raw.clamp(0.0, cap) } else { cap };

        let secs = if self.jitter > 0.0 {
            let spread = capped * self.jitter.min(1.0);
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            (capped + offset).max(0.0)
        } else {
            capped
        };
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
