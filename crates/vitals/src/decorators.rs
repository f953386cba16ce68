//! Health check decorators.
//!
//! Decorators wrap another [`HealthCheck`] and are composed at registration
//! time:
//! - [`SkippingHealthCheck`]: runs an expensive check only every Nth time.
//! - [`TimeoutHealthCheck`]: bounds a single check's running time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::check::HealthCheck;
use crate::error::{HealthError, HealthResult};
use crate::outcome::HealthCheckResult;

/// Runs the wrapped check on every Nth invocation and replays the last
/// result otherwise.
///
/// The first invocation always runs the delegate. Meant for a single
/// periodic caller such as the heartbeat: the invocation counter is atomic
/// but the cached result is not swapped together with it, so concurrent
/// callers may observe a stale result.
pub struct SkippingHealthCheck {
    delegate: Arc<dyn HealthCheck>,
    every: u64,
    invocations: AtomicU64,
    last: Mutex<Option<HealthCheckResult>>,
}

impl SkippingHealthCheck {
    /// Skip `skip` invocations after each real run, i.e. run every
    /// `skip + 1`th invocation.
    pub fn new(delegate: Arc<dyn HealthCheck>, skip: u32) -> Self {
        Self {
            delegate,
            every: u64::from(skip) + 1,
            invocations: AtomicU64::new(0),
            last: Mutex::new(None),
        }
    }

    /// Run the delegate on every `every`th invocation.
    pub fn every(delegate: Arc<dyn HealthCheck>, every: u32) -> HealthResult<Self> {
        if every == 0 {
            return Err(HealthError::InvalidConfig(
                "skipping check must run at least every 1st invocation".to_string(),
            ));
        }
        Ok(Self::new(delegate, every - 1))
    }

    /// Number of invocations between real runs, plus one.
    pub fn period(&self) -> u64 {
        self.every
    }

    fn cached(&self) -> Option<HealthCheckResult> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HealthCheck for SkippingHealthCheck {
    async fn check(&self) -> anyhow::Result<HealthCheckResult> {
        let invocation = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;

        if (invocation - 1) % self.every != 0 {
            if let Some(result) = self.cached() {
                debug!(invocation, every = self.every, "Replaying cached result");
                return Ok(result);
            }
        }

        let result = self.delegate.safe_check().await;
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(result.clone());
        Ok(result)
    }

    fn is_active(&self) -> bool {
        self.delegate.is_active()
    }
}

/// Bounds the running time of the wrapped check.
///
/// A delegate that does not finish within the limit is dropped and reported
/// as a critical "health check timed out" result.
pub struct TimeoutHealthCheck {
    delegate: Arc<dyn HealthCheck>,
    timeout: Duration,
}

impl TimeoutHealthCheck {
    /// Wrap a check with a time limit.
    pub fn new(delegate: Arc<dyn HealthCheck>, timeout: Duration) -> Self {
        Self { delegate, timeout }
    }

    /// Configured time limit.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HealthCheck for TimeoutHealthCheck {
    async fn check(&self) -> anyhow::Result<HealthCheckResult> {
        match tokio::time::timeout(self.timeout, self.delegate.safe_check()).await {
            Ok(result) => Ok(result),
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Health check exceeded its time limit"
                );
                Ok(HealthCheckResult::timed_out())
            }
        }
    }

    fn is_active(&self) -> bool {
        self.delegate.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::from_fn;
    use crate::outcome::TIMED_OUT_MESSAGE;
    use crate::status::Status;
    use std::sync::atomic::AtomicUsize;

    fn counting_check(counter: Arc<AtomicUsize>) -> Arc<dyn HealthCheck> {
        Arc::new(from_fn(move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(HealthCheckResult::ok(format!("run {}", n)))
            }
        }))
    }

    #[tokio::test]
    async fn test_skipping_runs_every_second_invocation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let check = SkippingHealthCheck::new(counting_check(counter.clone()), 1);
        assert_eq!(check.period(), 2);

        let mut seen = Vec::new();
        let mut messages = Vec::new();
        for _ in 0..5 {
            let result = check.safe_check().await;
            seen.push(counter.load(Ordering::SeqCst));
            messages.push(result.message().unwrap_or_default());
        }

        assert_eq!(seen, vec![1, 1, 2, 2, 3]);
        assert_eq!(messages, vec!["run 1", "run 1", "run 2", "run 2", "run 3"]);
    }

    #[tokio::test]
    async fn test_skipping_with_period_one_always_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let check = SkippingHealthCheck::every(counting_check(counter.clone()), 1).unwrap();

        for _ in 0..3 {
            check.safe_check().await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_skipping_caches_failures() {
        let counter = Arc::new(AtomicUsize::new(0));
        let failing = {
            let counter = counter.clone();
            from_fn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow::anyhow!("unreachable")) }
            })
        };
        let check = SkippingHealthCheck::new(Arc::new(failing), 2);

        for _ in 0..3 {
            assert_eq!(check.safe_check().await.status(), Status::Critical);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_skipping_rejects_zero_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(SkippingHealthCheck::every(counting_check(counter), 0).is_err());
    }

    #[tokio::test]
    async fn test_skipping_delegates_active_flag() {
        let inactive = from_fn(|| async { Ok(HealthCheckResult::healthy()) }).inactive();
        let check = SkippingHealthCheck::new(Arc::new(inactive), 3);
        assert!(!check.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_critical() {
        let slow = from_fn(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(HealthCheckResult::healthy())
        });
        let check = TimeoutHealthCheck::new(Arc::new(slow), Duration::from_millis(100));

        let result = check.safe_check().await;
        assert_eq!(result.status(), Status::Critical);
        assert_eq!(result.message().as_deref(), Some(TIMED_OUT_MESSAGE));
    }

    #[tokio::test]
    async fn test_timeout_passes_fast_result() {
        let fast = from_fn(|| async { Ok(HealthCheckResult::warning("meh")) });
        let check = TimeoutHealthCheck::new(Arc::new(fast), Duration::from_secs(1));

        assert_eq!(check.safe_check().await.status(), Status::Warning);
    }
}
