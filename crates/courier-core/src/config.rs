//! Dispatcher configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::RetryPolicy;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("workers must be at least 1")]
    NoWorkers,

    #[error("retry.max_attempts must be at least 1")]
    NoAttempts,

    #[error("retry.multiplier must be a finite number >= 1.0, got {0}")]
    BadMultiplier(f64),

    #[error("retry.jitter must be within [0.0, 1.0], got {0}")]
    BadJitter(f64),

    #[error("retry.max_delay ({max:?}) is below retry.base_delay ({base:?})")]
    CapBelowBase { base: Duration, max: Duration },

    #[error("lease ({lease:?}) must exceed delivery_timeout ({timeout:?})")]
    LeaseTooShort { lease: Duration, timeout: Duration },

    #[error("sweep_interval must be greater than zero")]
    NoSweepInterval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Size of the delivery worker pool.
    pub workers: usize,

    /// How long a claim keeps other workers away from an entry.
    #[serde(with = "duration_ms", rename = "lease_ms")]
    pub lease: Duration,

    /// Idle wait between polls when no wake-up signal arrives.
    #[serde(with = "duration_ms", rename = "poll_interval_ms")]
    pub poll_interval: Duration,

    /// Upper bound for delivering one entry to all of its consumers.
    #[serde(with = "duration_ms", rename = "delivery_timeout_ms")]
    pub delivery_timeout: Duration,

    pub retry: RetryPolicy,

    /// Dispatched and abandoned entries are kept this long, then pruned.
    #[serde(with = "duration_ms", rename = "retention_ms")]
    pub retention: Duration,

    /// Period of the retention sweep.
    #[serde(with = "duration_ms", rename = "sweep_interval_ms")]
    pub sweep_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            lease: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            delivery_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        let multiplier = self.retry.multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::BadMultiplier(multiplier));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::BadJitter(self.retry.jitter));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(ConfigError::CapBelowBase {
                base: self.retry.base_delay,
                max: self.retry.max_delay,
            });
        }
        // a lease that expires mid-delivery hands the entry to a second worker
        if self.lease <= self.delivery_timeout {
            return Err(ConfigError::LeaseTooShort {
                lease: self.lease,
                timeout: self.delivery_timeout,
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::NoSweepInterval);
        }
        Ok(())
    }
}

/// `Duration` as integer milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
