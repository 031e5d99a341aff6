use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use courier_core::DispatcherConfig;

/// Storage adapter, chosen once at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChoice {
    Memory,
    File(PathBuf),
}

impl FromStr for StoreChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s == "memory" => Ok(StoreChoice::Memory),
            Some(("file", path)) if !path.is_empty() => Ok(StoreChoice::File(PathBuf::from(path))),
            _ => bail!("COURIER_STORE must be `memory` or `file:<path>`, got `{s}`"),
        }
    }
}

pub struct CliConfig {
    pub store: StoreChoice,
    pub dispatcher: DispatcherConfig,

    /// Transient failures the demo receipt consumer produces before it
    /// starts succeeding.
    pub demo_failures: u32,
}

impl CliConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let store = std::env::var("COURIER_STORE")
            .unwrap_or_else(|_| "memory".into())
            .parse()?;

        let mut dispatcher = DispatcherConfig::default();
        if let Some(workers) = parse_var("COURIER_WORKERS")? {
            dispatcher.workers = workers;
        }
        if let Some(max_attempts) = parse_var("COURIER_MAX_ATTEMPTS")? {
            dispatcher.retry.max_attempts = max_attempts;
        }
        if let Some(ms) = parse_var("COURIER_BASE_DELAY_MS")? {
            dispatcher.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("COURIER_MAX_DELAY_MS")? {
            dispatcher.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("COURIER_LEASE_MS")? {
            dispatcher.lease = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("COURIER_POLL_MS")? {
            dispatcher.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("COURIER_RETENTION_MS")? {
            dispatcher.retention = Duration::from_millis(ms);
        }
        dispatcher.validate().context("invalid dispatcher settings")?;

        let demo_failures = parse_var("COURIER_DEMO_FAILURES")?.unwrap_or(2);

        Ok(Self {
            store,
            dispatcher,
            demo_failures,
        })
    }
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid {name}: `{raw}`")),
        Err(_) => Ok(None),
    }
}
