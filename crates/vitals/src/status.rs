//! Health status and its external code table.

use serde::{Deserialize, Serialize};

/// Status of a health check.
///
/// Variants are declared in severity order, so the derived `Ord` ranks
/// `Ok < Warning < Unknown < Critical`. An unknown status is indeterminate
/// rather than worse than everything. The numeric [`code`](Status::code)
/// exposed to monitoring integrations follows a different, fixed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Check passed.
    Ok,
    /// Check passed but is approaching a limit.
    Warning,
    /// Check result could not be determined.
    Unknown,
    /// Check failed.
    Critical,
}

impl Status {
    /// All statuses in severity order.
    pub const ALL: [Status; 4] = [
        Status::Ok,
        Status::Warning,
        Status::Unknown,
        Status::Critical,
    ];

    /// Plugin exit code: OK=0, WARNING=1, CRITICAL=2, UNKNOWN=3.
    pub fn code(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    /// Inverse of [`code`](Status::code).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::Warning),
            2 => Some(Status::Critical),
            3 => Some(Status::Unknown),
            _ => None,
        }
    }

    /// Whether this status counts as healthy.
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// Most severe of a set of statuses, `Ok` when empty.
    pub fn worst(statuses: impl IntoIterator<Item = Status>) -> Status {
        statuses.into_iter().max().unwrap_or(Status::Ok)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Warning => write!(f, "WARNING"),
            Status::Critical => write!(f, "CRITICAL"),
            Status::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Status::Ok < Status::Warning);
        assert!(Status::Warning < Status::Unknown);
        assert!(Status::Unknown < Status::Critical);
    }

    #[test]
    fn test_codes_follow_plugin_convention() {
        assert_eq!(Status::Ok.code(), 0);
        assert_eq!(Status::Warning.code(), 1);
        assert_eq!(Status::Critical.code(), 2);
        assert_eq!(Status::Unknown.code(), 3);

        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(4), None);
    }

    #[test]
    fn test_worst() {
        assert_eq!(Status::worst([]), Status::Ok);
        assert_eq!(
            Status::worst([Status::Ok, Status::Unknown, Status::Warning]),
            Status::Unknown
        );
        assert_eq!(
            Status::worst([Status::Critical, Status::Unknown]),
            Status::Critical
        );
    }

    #[test]
    fn test_serde_uses_upper_case_names() {
        let json = serde_json::to_string(&Status::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
        assert_eq!(Status::Critical.to_string(), "CRITICAL");
    }
}
