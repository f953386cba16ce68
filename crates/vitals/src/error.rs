//! Error types for the vitals crate.
//!
//! Probe failures never surface here: they are folded into
//! [`HealthCheckResult`](crate::HealthCheckResult)s by
//! [`HealthCheck::safe_check`](crate::HealthCheck::safe_check). These errors
//! cover lookups, configuration and scheduler lifecycle misuse.

use thiserror::Error;

/// Errors that can occur while configuring or driving health checks.
#[derive(Debug, Error)]
pub enum HealthError {
    /// No health check is registered under this name.
    #[error("unknown health check: {0}")]
    UnknownCheck(String),

    /// The heartbeat has already been started.
    #[error("heartbeat already running")]
    AlreadyRunning,

    /// Scheduler or registry parameters are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A threshold string could not be parsed.
    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),

    /// The worker pool could not be created.
    #[error("worker pool error: {0}")]
    Pool(String),

    /// Layered configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result type for health operations.
pub type HealthResult<T> = Result<T, HealthError>;
