//! Threshold ranges for classifying measurements.
//!
//! A [`Range`] holds up to four [`Threshold`]s (min, warning, critical, max)
//! sorted highest value first. A measurement "reaches" the highest threshold
//! whose value does not exceed it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HealthError, HealthResult};
use crate::status::Status;

/// Kind of threshold boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdKind {
    /// Lowest expected value.
    Min,
    /// Start of the warning band.
    Warning,
    /// Start of the critical band.
    Critical,
    /// Highest expected value.
    Max,
}

impl ThresholdKind {
    /// Status nominally attached to reaching this threshold.
    ///
    /// Exceeding the maximum leaves the expected domain, so it ranks like
    /// [`Status::Unknown`]. Reports escalate it, see
    /// [`reported_status`](ThresholdKind::reported_status).
    pub fn nominal_status(self) -> Status {
        match self {
            ThresholdKind::Min => Status::Ok,
            ThresholdKind::Warning => Status::Warning,
            ThresholdKind::Critical => Status::Critical,
            ThresholdKind::Max => Status::Unknown,
        }
    }

    /// Status reported when a measurement reaches this threshold.
    pub fn reported_status(self) -> Status {
        match self {
            ThresholdKind::Max => Status::Critical,
            kind => kind.nominal_status(),
        }
    }
}

impl std::fmt::Display for ThresholdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdKind::Min => write!(f, "min"),
            ThresholdKind::Warning => write!(f, "warning"),
            ThresholdKind::Critical => write!(f, "critical"),
            ThresholdKind::Max => write!(f, "max"),
        }
    }
}

/// A boundary value tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold<T> {
    /// Kind of boundary.
    pub kind: ThresholdKind,

    /// Boundary value; reached when a measurement is greater or equal.
    pub value: T,
}

impl<T: PartialOrd> Threshold<T> {
    /// Whether `value` reaches or exceeds this threshold.
    pub fn is_reached_by(&self, value: &T) -> bool {
        self.value <= *value
    }
}

/// Immutable, ordered set of thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range<T> {
    thresholds: Vec<Threshold<T>>,
}

impl<T> Default for Range<T> {
    fn default() -> Self {
        Self {
            thresholds: Vec::new(),
        }
    }
}

impl<T> Range<T> {
    /// Thresholds, highest value first.
    pub fn thresholds(&self) -> &[Threshold<T>] {
        &self.thresholds
    }

    /// Whether the range has no thresholds.
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

impl<T: PartialOrd + Clone> Range<T> {
    /// Start building a range.
    pub fn builder() -> RangeBuilder<T> {
        RangeBuilder::default()
    }

    /// Threshold of the given kind, if configured.
    pub fn get(&self, kind: ThresholdKind) -> Option<&Threshold<T>> {
        self.thresholds.iter().find(|t| t.kind == kind)
    }

    /// Highest threshold not exceeding `value`.
    ///
    /// Returns `None` when `value` is below every threshold, which includes
    /// values below the configured minimum and values below the lowest
    /// boundary of a range without a minimum.
    pub fn reached_threshold(&self, value: &T) -> Option<&Threshold<T>> {
        self.thresholds.iter().find(|t| t.is_reached_by(value))
    }

    /// Two-threshold shortcut using only the warning and critical boundaries.
    ///
    /// Values reaching critical are `Critical`, values reaching warning are
    /// `Warning`, everything else is `Ok`. Missing boundaries are never
    /// reached.
    pub fn classify(&self, value: &T) -> Status {
        let reached = |kind: ThresholdKind| {
            self.get(kind)
                .map(|t| t.is_reached_by(value))
                .unwrap_or(false)
        };

        if reached(ThresholdKind::Critical) {
            Status::Critical
        } else if reached(ThresholdKind::Warning) {
            Status::Warning
        } else {
            Status::Ok
        }
    }
}

impl<T> Range<T>
where
    T: PartialOrd + Clone + FromStr,
    T::Err: std::fmt::Display,
{
    /// Parse a compact `"warning,critical"` string.
    ///
    /// One value sets only the critical boundary, two set warning and
    /// critical. An empty or blank string yields an empty range; more than
    /// two values are rejected. Whitespace around each value is ignored.
    pub fn parse(spec: &str) -> HealthResult<Self> {
        if spec.trim().is_empty() {
            return Ok(Self::default());
        }

        let values = spec
            .split(',')
            .map(|token| {
                let token = token.trim();
                token.parse::<T>().map_err(|e| {
                    HealthError::InvalidThresholds(format!("'{}' in '{}': {}", token, spec, e))
                })
            })
            .collect::<HealthResult<Vec<T>>>()?;

        let builder = match values.as_slice() {
            [critical] => Self::builder().critical(critical.clone()),
            [warning, critical] => Self::builder()
                .warning(warning.clone())
                .critical(critical.clone()),
            _ => {
                return Err(HealthError::InvalidThresholds(format!(
                    "expected at most two values, got {} in '{}'",
                    values.len(),
                    spec
                )))
            }
        };

        Ok(builder.build())
    }
}

/// Additive builder for [`Range`].
#[derive(Debug, Clone)]
pub struct RangeBuilder<T> {
    min: Option<T>,
    warning: Option<T>,
    critical: Option<T>,
    max: Option<T>,
}

impl<T> Default for RangeBuilder<T> {
    fn default() -> Self {
        Self {
            min: None,
            warning: None,
            critical: None,
            max: None,
        }
    }
}

impl<T: PartialOrd + Clone> RangeBuilder<T> {
    /// Set the minimum boundary.
    pub fn min(mut self, value: T) -> Self {
        self.min = Some(value);
        self
    }

    /// Set the warning boundary.
    pub fn warning(mut self, value: T) -> Self {
        self.warning = Some(value);
        self
    }

    /// Set the critical boundary.
    pub fn critical(mut self, value: T) -> Self {
        self.critical = Some(value);
        self
    }

    /// Set the maximum boundary.
    pub fn max(mut self, value: T) -> Self {
        self.max = Some(value);
        self
    }

    /// Freeze the thresholds, highest value first.
    ///
    /// Equal values keep builder order (max, critical, warning, min), so the
    /// more severe kind wins a tie. Incomparable values keep builder order too.
    pub fn build(self) -> Range<T> {
        let mut thresholds: Vec<Threshold<T>> = [
            (ThresholdKind::Max, self.max),
            (ThresholdKind::Critical, self.critical),
            (ThresholdKind::Warning, self.warning),
            (ThresholdKind::Min, self.min),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.map(|value| Threshold { kind, value }))
        .collect();

        thresholds.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Range { thresholds }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_range() -> Range<i64> {
        Range::builder()
            .warning(10)
            .max(100)
            .min(0)
            .critical(50)
            .build()
    }

    fn reached(range: &Range<i64>, value: i64) -> Option<ThresholdKind> {
        range.reached_threshold(&value).map(|t| t.kind)
    }

    #[test]
    fn test_build_sorts_highest_first() {
        let range = full_range();
        let kinds: Vec<_> = range.thresholds().iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ThresholdKind::Max,
                ThresholdKind::Critical,
                ThresholdKind::Warning,
                ThresholdKind::Min
            ]
        );
    }

    #[test]
    fn test_reached_threshold_walks_bands() {
        let range = full_range();

        assert_eq!(reached(&range, -1), None);
        assert_eq!(reached(&range, 0), Some(ThresholdKind::Min));
        assert_eq!(reached(&range, 9), Some(ThresholdKind::Min));
        assert_eq!(reached(&range, 10), Some(ThresholdKind::Warning));
        assert_eq!(reached(&range, 49), Some(ThresholdKind::Warning));
        assert_eq!(reached(&range, 50), Some(ThresholdKind::Critical));
        assert_eq!(reached(&range, 99), Some(ThresholdKind::Critical));
        assert_eq!(reached(&range, 100), Some(ThresholdKind::Max));
        assert_eq!(reached(&range, 1_000), Some(ThresholdKind::Max));
    }

    #[test]
    fn test_max_is_reported_critical() {
        assert_eq!(ThresholdKind::Max.nominal_status(), Status::Unknown);
        assert_eq!(ThresholdKind::Max.reported_status(), Status::Critical);
        assert_eq!(ThresholdKind::Min.reported_status(), Status::Ok);
        assert_eq!(ThresholdKind::Warning.reported_status(), Status::Warning);
    }

    #[test]
    fn test_reached_without_min() {
        let range = Range::builder().warning(5).critical(8).build();
        assert_eq!(reached(&range, 4), None);
        assert_eq!(reached(&range, 5), Some(ThresholdKind::Warning));
    }

    #[test]
    fn test_classify_two_thresholds() {
        let range = Range::builder().warning(5).critical(8).build();

        assert_eq!(range.classify(&-1), Status::Ok);
        assert_eq!(range.classify(&0), Status::Ok);
        assert_eq!(range.classify(&5), Status::Warning);
        assert_eq!(range.classify(&6), Status::Warning);
        assert_eq!(range.classify(&9), Status::Critical);
    }

    #[test]
    fn test_classify_critical_only() {
        let range = Range::builder().critical(8.0).build();
        assert_eq!(range.classify(&7.9), Status::Ok);
        assert_eq!(range.classify(&8.0), Status::Critical);
    }

    #[test]
    fn test_parse() {
        let both: Range<f64> = Range::parse(" 5 , 8 ").unwrap();
        assert_eq!(both.get(ThresholdKind::Warning).map(|t| t.value), Some(5.0));
        assert_eq!(both.get(ThresholdKind::Critical).map(|t| t.value), Some(8.0));

        let single: Range<u32> = Range::parse("90").unwrap();
        assert!(single.get(ThresholdKind::Warning).is_none());
        assert_eq!(single.get(ThresholdKind::Critical).map(|t| t.value), Some(90));

        let empty: Range<u32> = Range::parse("  ").unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.classify(&1_000), Status::Ok);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            Range::<u32>::parse("1,2,3"),
            Err(HealthError::InvalidThresholds(_))
        ));
        assert!(matches!(
            Range::<u32>::parse("1,abc"),
            Err(HealthError::InvalidThresholds(_))
        ));
        assert!(matches!(
            Range::<u32>::parse("1,"),
            Err(HealthError::InvalidThresholds(_))
        ));
    }
}
