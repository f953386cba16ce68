//! Registry of named health checks.
//!
//! A [`HealthCheckRegistry`] is built once and never mutated. It evaluates
//! its checks serially, one by name, or fanned out over a [`WorkerPool`]
//! under a single deadline. Narrower or decorated registries are new values.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::check::HealthCheck;
use crate::decorators::SkippingHealthCheck;
use crate::error::{HealthError, HealthResult};
use crate::outcome::HealthCheckResult;
use crate::pool::WorkerPool;

/// Results of one evaluation round, keyed by check name.
pub type HealthCheckResults = BTreeMap<String, HealthCheckResult>;

/// Immutable mapping from name to health check.
#[derive(Clone, Default)]
pub struct HealthCheckRegistry {
    checks: BTreeMap<String, Arc<dyn HealthCheck>>,
}

impl HealthCheckRegistry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Number of registered checks, active or not.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Registered names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }

    /// Look up a check by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn HealthCheck>> {
        self.checks.get(name)
    }

    fn active(&self) -> impl Iterator<Item = (&String, &Arc<dyn HealthCheck>)> {
        self.checks.iter().filter(|(_, check)| check.is_active())
    }

    /// Run every active check one after another.
    ///
    /// There is no time limit: a hung check blocks the whole call.
    #[instrument(skip(self), fields(checks = self.checks.len()))]
    pub async fn run(&self) -> HealthCheckResults {
        let mut results = HealthCheckResults::new();

        for (name, check) in self.active() {
            let start = Instant::now();
            let result = check.safe_check().await;
            debug!(
                check = %name,
                status = %result.status(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Health check completed"
            );
            results.insert(name.clone(), result);
        }

        results
    }

    /// Run a single check by name, active or not.
    #[instrument(skip(self))]
    pub async fn run_one(&self, name: &str) -> HealthResult<HealthCheckResult> {
        let check = self
            .checks
            .get(name)
            .ok_or_else(|| HealthError::UnknownCheck(name.to_string()))?;

        Ok(check.safe_check().await)
    }

    /// Run every active check as its own task on `pool`, waiting at most
    /// `timeout` for all of them together.
    ///
    /// Checks still running at the deadline are reported as critical
    /// "health check timed out" results. They are not cancelled and keep
    /// occupying the pool until they finish or the pool shuts down. Tasks
    /// that died without a result are reported as critical with the reason.
    #[instrument(skip(self, pool), fields(checks = self.checks.len()))]
    pub async fn run_parallel(&self, pool: &WorkerPool, timeout: Duration) -> HealthCheckResults {
        let deadline = tokio::time::Instant::now() + timeout;

        let tasks: Vec<(String, JoinHandle<HealthCheckResult>)> = self
            .active()
            .map(|(name, check)| {
                let check = Arc::clone(check);
                (
                    name.clone(),
                    pool.spawn(async move { check.safe_check().await }),
                )
            })
            .collect();

        let mut results = HealthCheckResults::new();

        for (name, task) in tasks {
            let result = match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => {
                    warn!(check = %name, error = %join_error, "Health check task failed");
                    HealthCheckResult::critical(format!(
                        "health check task failed: {}",
                        join_error
                    ))
                }
                Err(_) => {
                    warn!(
                        check = %name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Health check timed out"
                    );
                    HealthCheckResult::timed_out()
                }
            };

            debug!(check = %name, status = %result.status(), "Health check resolved");
            results.insert(name, result);
        }

        results
    }

    /// New registry holding only the checks whose names satisfy `predicate`.
    pub fn filtered<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&str) -> bool,
    {
        Self {
            checks: self
                .checks
                .iter()
                .filter(|(name, _)| predicate(name.as_str()))
                .map(|(name, check)| (name.clone(), Arc::clone(check)))
                .collect(),
        }
    }

    /// New registry holding only the named checks; unknown names are
    /// ignored.
    pub fn only<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        self.filtered(|name| names.contains(name))
    }

    /// New registry where each check listed in `skips` is wrapped in a
    /// [`SkippingHealthCheck`] skipping that many invocations between runs.
    pub fn with_skips(&self, skips: &BTreeMap<String, u32>) -> Self {
        Self {
            checks: self
                .checks
                .iter()
                .map(|(name, check)| {
                    let check = match skips.get(name) {
                        Some(&skip) if skip > 0 => {
                            Arc::new(SkippingHealthCheck::new(Arc::clone(check), skip))
                                as Arc<dyn HealthCheck>
                        }
                        _ => Arc::clone(check),
                    };
                    (name.clone(), check)
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for HealthCheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCheckRegistry")
            .field("checks", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder collecting checks before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    checks: BTreeMap<String, Arc<dyn HealthCheck>>,
}

impl RegistryBuilder {
    /// Register a check under `name`.
    pub fn register<C>(self, name: impl Into<String>, check: C) -> HealthResult<Self>
    where
        C: HealthCheck + 'static,
    {
        self.register_arc(name, Arc::new(check))
    }

    /// Register a shared check under `name`.
    ///
    /// Names must be unique and non-empty.
    pub fn register_arc(
        mut self,
        name: impl Into<String>,
        check: Arc<dyn HealthCheck>,
    ) -> HealthResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(HealthError::InvalidConfig(
                "health check name must not be empty".to_string(),
            ));
        }
        if self.checks.contains_key(&name) {
            return Err(HealthError::InvalidConfig(format!(
                "health check '{}' registered twice",
                name
            )));
        }

        self.checks.insert(name, check);
        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> HealthCheckRegistry {
        HealthCheckRegistry {
            checks: self.checks,
        }
    }
}
