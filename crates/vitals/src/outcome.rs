//! Health check results.
//!
//! A [`HealthCheckResult`] is the immutable outcome of evaluating one check:
//! a [`Status`], an optional message, an optional cause and optional
//! measurement data.

use std::cmp::Ordering;
use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::range::{Range, ThresholdKind};
use crate::status::Status;

/// Message carried by results synthesized for unfinished checks.
pub const TIMED_OUT_MESSAGE: &str = "health check timed out";

/// Measured value and the thresholds it was classified against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Rendered measured value.
    pub value: String,

    /// Rendered thresholds, highest value first.
    pub thresholds: Vec<(ThresholdKind, String)>,
}

impl Measurement {
    /// Snapshot a value together with the range it was classified against.
    pub fn new<T: Display>(value: &T, range: &Range<T>) -> Self {
        Self {
            value: value.to_string(),
            thresholds: range
                .thresholds()
                .iter()
                .map(|t| (t.kind, t.value.to_string()))
                .collect(),
        }
    }

    /// Rendered value of the threshold of the given kind, if present.
    pub fn threshold(&self, kind: ThresholdKind) -> Option<&str> {
        self.thresholds
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| v.as_str())
    }
}

/// Result of a health check.
///
/// Results compare by status alone, so the most severe of many results is
/// simply their `max()`.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    status: Status,
    message: Option<String>,
    cause: Option<Arc<anyhow::Error>>,
    data: Option<Measurement>,
    checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    /// Create a result with the given status and message.
    pub fn new(status: Status, message: Option<String>) -> Self {
        Self {
            status,
            message,
            cause: None,
            data: None,
            checked_at: Utc::now(),
        }
    }

    /// Healthy result without a message.
    pub fn healthy() -> Self {
        Self::new(Status::Ok, None)
    }

    /// Healthy result with a message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Status::Ok, Some(message.into()))
    }

    /// Warning result.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Status::Warning, Some(message.into()))
    }

    /// Critical result.
    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Status::Critical, Some(message.into()))
    }

    /// Unknown result.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Status::Unknown, Some(message.into()))
    }

    /// Critical result caused by an error. The message is taken from the
    /// error when rendered.
    pub fn failed(cause: anyhow::Error) -> Self {
        Self::failed_with(Status::Critical, cause)
    }

    /// Result with an explicit status caused by an error.
    pub fn failed_with(status: Status, cause: anyhow::Error) -> Self {
        Self {
            cause: Some(Arc::new(cause)),
            ..Self::new(status, None)
        }
    }

    /// Critical result for a check that did not finish in time.
    pub fn timed_out() -> Self {
        Self::critical(TIMED_OUT_MESSAGE)
    }

    /// Attach measurement data.
    pub fn with_data(mut self, data: Measurement) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach an explicit message, keeping any cause.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Status of the check.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Whether the check passed.
    pub fn is_healthy(&self) -> bool {
        self.status.is_ok()
    }

    /// Explicit message, falling back to the cause's message.
    pub fn message(&self) -> Option<String> {
        match (&self.message, &self.cause) {
            (Some(message), _) => Some(message.clone()),
            (None, Some(cause)) => Some(format!("{:#}", cause)),
            (None, None) => None,
        }
    }

    /// Error that produced this result, if any.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_deref()
    }

    /// Measurement data, if any.
    pub fn data(&self) -> Option<&Measurement> {
        self.data.as_ref()
    }

    /// Time the result was produced.
    pub fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }
}

impl PartialEq for HealthCheckResult {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status
    }
}

impl Eq for HealthCheckResult {}

impl PartialOrd for HealthCheckResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HealthCheckResult {
    fn cmp(&self, other: &Self) -> Ordering {
        self.status.cmp(&other.status)
    }
}

impl std::fmt::Display for HealthCheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{}: {}", self.status, message),
            None => write!(f, "{}", self.status),
        }
    }
}

/// Most severe status across a set of results, `Ok` when empty.
pub fn worst_status<'a>(results: impl IntoIterator<Item = &'a HealthCheckResult>) -> Status {
    Status::worst(results.into_iter().map(HealthCheckResult::status))
}
