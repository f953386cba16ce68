//! The health check seam.
//!
//! A [`HealthCheck`] is a unit of work that produces a
//! [`HealthCheckResult`]. Checks may fail or even panic; callers go through
//! [`HealthCheck::safe_check`], which turns both into critical results.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::FutureExt;

use crate::outcome::HealthCheckResult;

/// Trait for health checks.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Run the check.
    async fn check(&self) -> anyhow::Result<HealthCheckResult>;

    /// Whether the check takes part in evaluation rounds.
    fn is_active(&self) -> bool {
        true
    }

    /// Run the check, converting errors and panics into critical results.
    async fn safe_check(&self) -> HealthCheckResult {
        match AssertUnwindSafe(self.check()).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => HealthCheckResult::failed(error),
            Err(panic) => HealthCheckResult::failed(anyhow!(
                "health check panicked: {}",
                panic_message(panic.as_ref())
            )),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Health check backed by a closure.
pub struct FnCheck<F> {
    check_fn: F,
    active: bool,
}

impl<F> FnCheck<F> {
    /// Mark the check inactive; registries skip inactive checks.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Create a health check from an async closure.
pub fn from_fn<F, Fut>(check_fn: F) -> FnCheck<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<HealthCheckResult>> + Send + 'static,
{
    FnCheck {
        check_fn,
        active: true,
    }
}

#[async_trait]
impl<F, Fut> HealthCheck for FnCheck<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<HealthCheckResult>> + Send,
{
    async fn check(&self) -> anyhow::Result<HealthCheckResult> {
        (self.check_fn)().await
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
