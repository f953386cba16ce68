//! Heartbeat configuration.
//!
//! Defines the schedule, worker pool and per-check tuning of the periodic
//! heartbeat.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HealthError, HealthResult};
use crate::pool::DEFAULT_POOL_SIZE;

/// Configuration for the heartbeat scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Delay before the first heartbeat, in milliseconds.
    pub initial_delay_ms: u64,

    /// Delay between heartbeats, in milliseconds.
    pub period_ms: u64,

    /// Number of worker threads running checks.
    pub pool_size: usize,

    /// Time allowed for all checks of one heartbeat, in milliseconds.
    pub timeout_ms: u64,

    /// Names of the checks to run; all registered checks when unset.
    pub checks: Option<Vec<String>>,

    /// Heartbeats to skip between runs of an expensive check, by name.
    pub skips: BTreeMap<String, u32>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 0,
            period_ms: 60_000,
            pool_size: DEFAULT_POOL_SIZE,
            timeout_ms: 10_000,
            checks: None,
            skips: BTreeMap::new(),
        }
    }
}

impl HeartbeatConfig {
    /// Load configuration from defaults, an optional file and `VITALS_*`
    /// environment variables, in increasing priority.
    pub fn load(path: Option<&str>) -> HealthResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&HeartbeatConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("VITALS")
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameters the scheduler cannot honour.
    pub fn validate(&self) -> HealthResult<()> {
        if self.period_ms == 0 {
            return Err(HealthError::InvalidConfig(
                "heartbeat period must be positive".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(HealthError::InvalidConfig(
                "health check timeout must be positive".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(HealthError::InvalidConfig(
                "worker pool size must be positive".to_string(),
            ));
        }
        if let Some(checks) = &self.checks {
            if let Some(blank) = checks.iter().find(|name| name.trim().is_empty()) {
                return Err(HealthError::InvalidConfig(format!(
                    "blank health check name in allowlist: '{}'",
                    blank
                )));
            }
        }
        Ok(())
    }

    /// Delay before the first heartbeat.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Delay between heartbeats.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Time allowed for all checks of one heartbeat.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Set the delay before the first heartbeat.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the delay between heartbeats.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period_ms = period.as_millis() as u64;
        self
    }

    /// Set the time allowed for all checks of one heartbeat.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the worker pool size.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Restrict the heartbeat to the named checks.
    pub fn with_checks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.checks = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Skip `skip` heartbeats between runs of the named check.
    pub fn with_skip(mut self, name: impl Into<String>, skip: u32) -> Self {
        self.skips.insert(name.into(), skip);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HeartbeatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.period(), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_period = HeartbeatConfig::default().with_period(Duration::ZERO);
        assert!(matches!(
            zero_period.validate(),
            Err(HealthError::InvalidConfig(_))
        ));

        let zero_timeout = HeartbeatConfig::default().with_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());

        let zero_pool = HeartbeatConfig::default().with_pool_size(0);
        assert!(zero_pool.validate().is_err());

        let blank_name = HeartbeatConfig::default().with_checks(["db", " "]);
        assert!(blank_name.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: HeartbeatConfig = serde_json::from_str(
            r#"{"period_ms": 5000, "checks": ["db"], "skips": {"disk": 4}}"#,
        )
        .unwrap();

        assert_eq!(config.period(), Duration::from_secs(5));
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.checks, Some(vec!["db".to_string()]));
        assert_eq!(config.skips.get("disk"), Some(&4));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = HeartbeatConfig::load(None).unwrap();
        assert_eq!(config.period_ms, HeartbeatConfig::default().period_ms);
    }
}
