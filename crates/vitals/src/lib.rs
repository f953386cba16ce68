//! # Vitals - Health Checks and Heartbeat Scheduling
//!
//! This crate evaluates a set of independent, named health checks,
//! classifies measurements against threshold ranges, and runs the checks
//! periodically on a heartbeat that reports aggregate status to listeners.
//!
//! ## Key Components
//!
//! - [`HealthCheck`]: a unit of work producing a [`HealthCheckResult`]
//! - [`Status`]: severity ordered OK < WARNING < UNKNOWN < CRITICAL, with
//!   plugin exit codes OK=0, WARNING=1, CRITICAL=2, UNKNOWN=3
//! - [`Range`]: ordered thresholds classifying a measurement
//! - [`SkippingHealthCheck`] / [`TimeoutHealthCheck`]: decorators composed at
//!   registration time
//! - [`HealthCheckRegistry`]: immutable name to check mapping, evaluated
//!   serially or fanned out over a [`WorkerPool`] under one deadline
//! - [`Heartbeat`]: periodic scheduler notifying [`HeartbeatListener`]s
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use vitals::{
//!     checks::{gauge_fn, ValueRangeCheck},
//!     from_fn, HealthCheckRegistry, HealthCheckResult, Heartbeat, HeartbeatConfig,
//!     LoggingListener, Range,
//! };
//!
//! # fn example() -> vitals::HealthResult<()> {
//! let registry = HealthCheckRegistry::builder()
//!     .register("database", from_fn(|| async { Ok(HealthCheckResult::healthy()) }))?
//!     .register(
//!         "disk",
//!         ValueRangeCheck::new(
//!             "disk usage %",
//!             gauge_fn(|| async { Ok(42.0) }),
//!             Range::builder().min(0.0).warning(80.0).critical(95.0).max(100.0).build(),
//!         ),
//!     )?
//!     .build();
//!
//! let config = HeartbeatConfig::default()
//!     .with_period(Duration::from_secs(30))
//!     .with_timeout(Duration::from_secs(5))
//!     .with_skip("disk", 3);
//!
//! let heartbeat = Heartbeat::new(&registry, config)?.with_listener(Arc::new(LoggingListener));
//! heartbeat.start()?;
//! // ...
//! heartbeat.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Semantics
//!
//! - Check errors and panics become CRITICAL results; they never propagate.
//! - Checks still running at the fan-out deadline are reported as CRITICAL
//!   "health check timed out" and keep running in the background.
//! - A failing listener is logged and does not affect other listeners or
//!   later beats.

pub mod check;
pub mod checks;
pub mod config;
pub mod decorators;
pub mod error;
pub mod heartbeat;
pub mod outcome;
pub mod pool;
pub mod range;
pub mod registry;
pub mod status;

// Re-export main types
pub use check::{from_fn, FnCheck, HealthCheck};
pub use config::HeartbeatConfig;
pub use decorators::{SkippingHealthCheck, TimeoutHealthCheck};
pub use error::{HealthError, HealthResult};
pub use heartbeat::{Heartbeat, HeartbeatListener, LatestResults, LoggingListener};
pub use outcome::{worst_status, HealthCheckResult, Measurement, TIMED_OUT_MESSAGE};
pub use pool::{WorkerPool, DEFAULT_POOL_SIZE};
pub use range::{Range, RangeBuilder, Threshold, ThresholdKind};
pub use registry::{HealthCheckRegistry, HealthCheckResults, RegistryBuilder};
pub use status::Status;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_registry_with_decorated_checks() {
        let expensive: Arc<dyn HealthCheck> = Arc::new(from_fn(|| async {
            Ok(HealthCheckResult::ok("expensive"))
        }));

        let registry = HealthCheckRegistry::builder()
            .register("expensive", SkippingHealthCheck::new(expensive, 4))
            .unwrap()
            .register(
                "load",
                checks::ThresholdCheck::new(
                    "load",
                    checks::gauge_fn(|| async { Ok(6u32) }),
                    Range::parse("5,8").unwrap(),
                ),
            )
            .unwrap()
            .build();

        let results = registry.run().await;
        assert_eq!(results.len(), 2);
        assert_eq!(worst_status(results.values()), Status::Warning);
        assert_eq!(worst_status(results.values()).code(), 1);
    }
}
