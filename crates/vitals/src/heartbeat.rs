//! Periodic heartbeat running the registry and notifying listeners.
//!
//! The [`Heartbeat`] owns a dedicated timer thread and a [`WorkerPool`].
//! Each beat fans the registry out over the pool under one deadline, then
//! hands the complete result map to every [`HeartbeatListener`].

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::runtime::Builder;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::config::HeartbeatConfig;
use crate::error::{HealthError, HealthResult};
use crate::outcome::{worst_status, HealthCheckResult};
use crate::pool::WorkerPool;
use crate::registry::{HealthCheckRegistry, HealthCheckResults};
use crate::status::Status;

/// Receives the results of every heartbeat.
#[async_trait]
pub trait HeartbeatListener: Send + Sync {
    /// Called once per beat, after every check has resolved or timed out.
    async fn on_heartbeat(&self, results: &HealthCheckResults) -> anyhow::Result<()>;
}

/// Listener reporting each beat through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

#[async_trait]
impl HeartbeatListener for LoggingListener {
    async fn on_heartbeat(&self, results: &HealthCheckResults) -> anyhow::Result<()> {
        let status = worst_status(results.values());
        info!(status = %status, checks = results.len(), "Heartbeat");

        for (name, result) in results.iter().filter(|(_, r)| !r.is_healthy()) {
            let message = result.message().unwrap_or_default();
            warn!(
                check = %name,
                status = %result.status(),
                code = result.status().code(),
                message = %message,
                "Health check not OK"
            );
        }

        Ok(())
    }
}

/// Listener keeping the results of the latest beat for on-demand queries.
#[derive(Debug, Default)]
pub struct LatestResults {
    latest: RwLock<Option<HealthCheckResults>>,
}

impl LatestResults {
    /// Create an empty holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Results of the latest beat, if any beat has completed.
    pub fn latest(&self) -> Option<HealthCheckResults> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Result of one check in the latest beat.
    pub fn get(&self, name: &str) -> Option<HealthCheckResult> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|results| results.get(name).cloned())
    }

    /// Worst status of the latest beat, `Unknown` before the first beat.
    pub fn status(&self) -> Status {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|results| worst_status(results.values()))
            .unwrap_or(Status::Unknown)
    }
}

#[async_trait]
impl HeartbeatListener for LatestResults {
    async fn on_heartbeat(&self, results: &HealthCheckResults) -> anyhow::Result<()> {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(results.clone());
        Ok(())
    }
}

/// Resources held while the heartbeat runs.
struct Running {
    pool: Arc<WorkerPool>,
    shutdown_tx: watch::Sender<bool>,
    _timer: std::thread::JoinHandle<()>,
}

/// Periodic scheduler for a health check registry.
///
/// Lifecycle: idle, running after [`start`](Heartbeat::start), stopped after
/// [`stop`](Heartbeat::stop). A stopped heartbeat may be started again.
pub struct Heartbeat {
    config: HeartbeatConfig,
    registry: Arc<HealthCheckRegistry>,
    listeners: Vec<Arc<dyn HeartbeatListener>>,
    beats: Arc<AtomicU64>,
    running: Mutex<Option<Running>>,
}

impl Heartbeat {
    /// Create a heartbeat for `registry`.
    ///
    /// The configured allowlist and skip counts are applied to a new
    /// registry; `registry` itself is left untouched.
    pub fn new(registry: &HealthCheckRegistry, config: HeartbeatConfig) -> HealthResult<Self> {
        config.validate()?;

        let selected = match &config.checks {
            Some(names) => {
                for name in unregistered(registry, names) {
                    warn!(check = %name, "Allowlisted health check is not registered");
                }
                registry.only(names)
            }
            None => registry.clone(),
        };

        for name in unregistered(&selected, config.skips.keys()) {
            warn!(check = %name, "Skip count set for a health check that will not run");
        }

        Ok(Self {
            registry: Arc::new(selected.with_skips(&config.skips)),
            config,
            listeners: Vec::new(),
            beats: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
        })
    }

    /// Add a listener notified after every beat.
    pub fn with_listener(mut self, listener: Arc<dyn HeartbeatListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Registry evaluated on each beat.
    pub fn registry(&self) -> &HealthCheckRegistry {
        &self.registry
    }

    /// Configuration in effect.
    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Number of beats whose listeners have been notified.
    pub fn beat_count(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }

    /// Whether the heartbeat is running.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start the worker pool and the timer thread.
    ///
    /// Fails with [`HealthError::AlreadyRunning`] if already started.
    #[instrument(skip(self), fields(checks = self.registry.len()))]
    pub fn start(&self) -> HealthResult<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Err(HealthError::AlreadyRunning);
        }

        let pool = Arc::new(WorkerPool::new(self.config.pool_size)?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let timer_runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| HealthError::Pool(e.to_string()))?;

        let beat = Beat {
            registry: Arc::clone(&self.registry),
            listeners: self.listeners.clone(),
            pool: Arc::clone(&pool),
            timeout: self.config.timeout(),
            beats: Arc::clone(&self.beats),
        };
        let initial_delay = self.config.initial_delay();
        let period = self.config.period();

        let timer = std::thread::Builder::new()
            .name("vitals-heartbeat".to_string())
            .spawn(move || timer_runtime.block_on(beat.run(initial_delay, period, shutdown_rx)))
            .map_err(|e| {
                pool.shutdown();
                HealthError::Pool(e.to_string())
            })?;

        info!(
            initial_delay_ms = self.config.initial_delay_ms,
            period_ms = self.config.period_ms,
            timeout_ms = self.config.timeout_ms,
            pool_size = self.config.pool_size,
            "Heartbeat started"
        );

        *running = Some(Running {
            pool,
            shutdown_tx,
            _timer: timer,
        });

        Ok(())
    }

    /// Stop the timer and tear down the worker pool.
    ///
    /// Idempotent and safe before [`start`](Heartbeat::start). Does not wait
    /// for an in-flight beat. That beat still completes, reporting checks
    /// cut short by the pool shutdown as critical, and notifies listeners
    /// once; no further beat is scheduled.
    pub fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(running) = running {
            let _ = running.shutdown_tx.send(true);
            running.pool.shutdown();
            info!(beats = self.beat_count(), "Heartbeat stopped");
        }
    }
}

/// Configured names missing from `registry`.
fn unregistered<'a>(
    registry: &HealthCheckRegistry,
    names: impl IntoIterator<Item = &'a String>,
) -> Vec<&'a str> {
    names
        .into_iter()
        .map(String::as_str)
        .filter(|name| registry.get(name).is_none())
        .collect()
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the timer thread.
struct Beat {
    registry: Arc<HealthCheckRegistry>,
    listeners: Vec<Arc<dyn HeartbeatListener>>,
    pool: Arc<WorkerPool>,
    timeout: Duration,
    beats: Arc<AtomicU64>,
}

impl Beat {
    /// Fixed-delay loop: wait, beat, wait again, until shut down.
    ///
    /// Only the wait between beats observes shutdown. A beat already fanned
    /// out runs to completion; once the pool is torn down its outstanding
    /// checks resolve as critical results and listeners are notified once.
    async fn run(
        self,
        initial_delay: Duration,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut delay = initial_delay;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }

            // Stopped between the wake-up and the fan-out.
            if *shutdown.borrow() {
                break;
            }

            let results = self.registry.run_parallel(&self.pool, self.timeout).await;
            self.notify(&results).await;
            delay = period;
        }

        debug!("Heartbeat timer exited");
    }

    /// Hand one beat's results to every listener, isolating failures.
    async fn notify(&self, results: &HealthCheckResults) {
        let beat = self.beats.load(Ordering::SeqCst) + 1;
        debug!(
            beat,
            status = %worst_status(results.values()),
            listeners = self.listeners.len(),
            "Notifying heartbeat listeners"
        );

        for listener in &self.listeners {
            match AssertUnwindSafe(listener.on_heartbeat(results))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(beat, error = %e, "Heartbeat listener failed"),
                Err(_) => error!(beat, "Heartbeat listener panicked"),
            }
        }

        self.beats.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::from_fn;

    fn registry() -> HealthCheckRegistry {
        HealthCheckRegistry::builder()
            .register("db", from_fn(|| async { Ok(HealthCheckResult::healthy()) }))
            .unwrap()
            .register("disk", from_fn(|| async { Ok(HealthCheckResult::warning("80% used")) }))
            .unwrap()
            .build()
    }

    #[test]
    fn test_new_applies_allowlist() {
        let registry = registry();
        let heartbeat = Heartbeat::new(
            &registry,
            HeartbeatConfig::default().with_checks(["disk", "ghost"]),
        )
        .unwrap();

        assert_eq!(heartbeat.registry().names().collect::<Vec<_>>(), vec!["disk"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unregistered_names_are_reported() {
        let registry = registry();
        let names = vec!["db".to_string(), "ghost".to_string()];
        assert_eq!(unregistered(&registry, &names), vec!["ghost"]);

        let config = HeartbeatConfig::default()
            .with_checks(["db"])
            .with_skip("disk", 2)
            .with_skip("phantom", 1);
        let heartbeat = Heartbeat::new(&registry, config).unwrap();

        assert_eq!(
            unregistered(heartbeat.registry(), heartbeat.config().skips.keys()),
            vec!["disk", "phantom"]
        );
        assert_eq!(heartbeat.registry().names().collect::<Vec<_>>(), vec!["db"]);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Heartbeat::new(&registry(), HeartbeatConfig::default().with_pool_size(0));
        assert!(matches!(result, Err(HealthError::InvalidConfig(_))));
    }

    #[test]
    fn test_start_twice_fails_and_stop_is_idempotent() {
        let heartbeat = Heartbeat::new(
            &registry(),
            HeartbeatConfig::default().with_initial_delay(Duration::from_secs(60)),
        )
        .unwrap();

        heartbeat.stop();
        assert!(!heartbeat.is_running());

        heartbeat.start().unwrap();
        assert!(heartbeat.is_running());
        assert!(matches!(heartbeat.start(), Err(HealthError::AlreadyRunning)));

        heartbeat.stop();
        heartbeat.stop();
        assert!(!heartbeat.is_running());
    }

    #[tokio::test]
    async fn test_latest_results_listener() {
        let latest = LatestResults::new();
        assert_eq!(latest.status(), Status::Unknown);
        assert!(latest.latest().is_none());

        let results = registry().run().await;
        latest.on_heartbeat(&results).await.unwrap();

        assert_eq!(latest.status(), Status::Warning);
        assert_eq!(latest.get("db").map(|r| r.status()), Some(Status::Ok));
        assert!(latest.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_logging_listener_never_fails() {
        let results = registry().run().await;
        assert!(LoggingListener.on_heartbeat(&results).await.is_ok());
    }
}
