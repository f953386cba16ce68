//! Threshold-based health checks.
//!
//! Both checks read a value from a [`Gauge`] and classify it against a
//! [`Range`]:
//! - [`ValueRangeCheck`] walks every boundary, so values above the maximum
//!   are critical and values below the minimum are unknown.
//! - [`ThresholdCheck`] only looks at warning and critical.

use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::check::HealthCheck;
use crate::outcome::{HealthCheckResult, Measurement};
use crate::range::{Range, ThresholdKind};
use crate::status::Status;

/// Source of a measured value.
#[async_trait]
pub trait Gauge: Send + Sync {
    /// Type of the measured value.
    type Value: PartialOrd + Clone + Display + Send + Sync;

    /// Take a measurement.
    async fn read(&self) -> anyhow::Result<Self::Value>;
}

/// Gauge backed by an async closure.
pub struct FnGauge<F> {
    read_fn: F,
}

/// Create a gauge from an async closure.
pub fn gauge_fn<F, Fut, T>(read_fn: F) -> FnGauge<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<T>> + Send,
    T: PartialOrd + Clone + Display + Send + Sync,
{
    FnGauge { read_fn }
}

#[async_trait]
impl<F, Fut, T> Gauge for FnGauge<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<T>> + Send,
    T: PartialOrd + Clone + Display + Send + Sync,
{
    type Value = T;

    async fn read(&self) -> anyhow::Result<T> {
        (self.read_fn)().await
    }
}

/// Classifies a measurement by the highest boundary it reaches.
///
/// | reached  | status   |
/// |----------|----------|
/// | max      | CRITICAL |
/// | critical | CRITICAL |
/// | warning  | WARNING  |
/// | min      | OK       |
/// | nothing  | UNKNOWN  |
pub struct ValueRangeCheck<G: Gauge> {
    label: String,
    gauge: G,
    range: Range<G::Value>,
}

impl<G: Gauge> ValueRangeCheck<G> {
    /// Create a check reading `gauge` and classifying against `range`.
    pub fn new(label: impl Into<String>, gauge: G, range: Range<G::Value>) -> Self {
        Self {
            label: label.into(),
            gauge,
            range,
        }
    }

    /// Range the measurement is classified against.
    pub fn range(&self) -> &Range<G::Value> {
        &self.range
    }

    /// Classify an already taken measurement.
    pub fn evaluate(&self, value: &G::Value) -> HealthCheckResult {
        let data = Measurement::new(value, &self.range);

        let result = match self.range.reached_threshold(value) {
            Some(threshold) if threshold.kind == ThresholdKind::Min => {
                HealthCheckResult::ok(format!("{} is {}", self.label, value))
            }
            Some(threshold) => HealthCheckResult::new(
                threshold.kind.reported_status(),
                Some(format!(
                    "{} is {}, reached {} threshold {}",
                    self.label, value, threshold.kind, threshold.value
                )),
            ),
            None => HealthCheckResult::unknown(format!(
                "{} is {}, below the expected range",
                self.label, value
            )),
        };

        result.with_data(data)
    }
}

#[async_trait]
impl<G> HealthCheck for ValueRangeCheck<G>
where
    G: Gauge,
    G::Value: 'static,
{
    #[instrument(skip(self), fields(label = %self.label))]
    async fn check(&self) -> anyhow::Result<HealthCheckResult> {
        let value = self.gauge.read().await?;
        let result = self.evaluate(&value);
        debug!(value = %value, status = %result.status(), "Classified measurement");
        Ok(result)
    }
}

/// Classifies a measurement using only its warning and critical boundaries.
pub struct ThresholdCheck<G: Gauge> {
    label: String,
    gauge: G,
    range: Range<G::Value>,
}

impl<G: Gauge> ThresholdCheck<G> {
    /// Create a check reading `gauge` against warning/critical boundaries.
    pub fn new(label: impl Into<String>, gauge: G, range: Range<G::Value>) -> Self {
        Self {
            label: label.into(),
            gauge,
            range,
        }
    }

    /// Classify an already taken measurement.
    pub fn evaluate(&self, value: &G::Value) -> HealthCheckResult {
        let status = self.range.classify(value);
        let message = match status {
            Status::Ok => format!("{} is {}", self.label, value),
            _ => {
                let kind = if status == Status::Critical {
                    ThresholdKind::Critical
                } else {
                    ThresholdKind::Warning
                };
                match self.range.get(kind) {
                    Some(threshold) => format!(
                        "{} is {}, reached {} threshold {}",
                        self.label, value, kind, threshold.value
                    ),
                    None => format!("{} is {}", self.label, value),
                }
            }
        };

        HealthCheckResult::new(status, Some(message)).with_data(Measurement::new(value, &self.range))
    }
}

#[async_trait]
impl<G> HealthCheck for ThresholdCheck<G>
where
    G: Gauge,
    G::Value: 'static,
{
    #[instrument(skip(self), fields(label = %self.label))]
    async fn check(&self) -> anyhow::Result<HealthCheckResult> {
        let value = self.gauge.read().await?;
        let result = self.evaluate(&value);
        debug!(value = %value, status = %result.status(), "Classified measurement");
        Ok(result)
    }
}
