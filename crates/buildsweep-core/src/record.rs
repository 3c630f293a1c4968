//! Normalized build records
//!
//! Every driver, whatever the source looks like on the wire, hands the
//! pipeline the same flat record shape. The destination document is exactly
//! this struct serialized to JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder cause for builds whose trigger cannot be attributed.
pub const UNKNOWN_CAUSE: &str = "unknown";

/// One build, normalized for identity computation and upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    /// Base URL of the source instance this build came from
    pub host: String,
    /// Job name as shown by the source
    pub name: String,
    /// Build number, unique per job
    pub number: i64,
    /// Scheduling time in UTC
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration in milliseconds (0 while still running)
    pub duration: i64,
    /// Terminal status ("SUCCESS", "FAILURE", ...); None while running
    pub result: Option<String>,
    /// Deduplicated trigger attributions, never empty
    pub causes: Vec<String>,
    /// Total test count, 0 when the build published no test report
    pub test_total_count: i64,
    /// Skipped test count, 0 when absent
    pub test_skip_count: i64,
    /// Failed test count, 0 when absent
    pub test_fail_count: i64,
}

impl BuildRecord {
    /// Canonical timestamp form used for identity hashing: RFC 3339 in UTC
    /// with exactly millisecond precision, e.g. `2026-08-25T09:30:00.000Z`.
    pub fn canonical_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> BuildRecord {
        BuildRecord {
            host: "http://ci.local:9090".to_string(),
            name: "deploy".to_string(),
            number: 57,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            duration: 45_000,
            result: Some("SUCCESS".to_string()),
            causes: vec!["jdoe".to_string()],
            test_total_count: 120,
            test_skip_count: 3,
            test_fail_count: 1,
        }
    }

    #[test]
    fn test_canonical_timestamp_is_millisecond_utc() {
        let record = sample();
        assert_eq!(record.canonical_timestamp(), "2023-11-14T22:13:20.123Z");

        let truncated = BuildRecord {
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            ..sample()
        };
        // Whole seconds still carry the .000 so the hashed text never varies
        // in width.
        assert_eq!(truncated.canonical_timestamp(), "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn test_serializes_with_source_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("testTotalCount").is_some());
        assert!(json.get("testSkipCount").is_some());
        assert!(json.get("testFailCount").is_some());
        assert_eq!(json["name"], "deploy");
        assert_eq!(json["number"], 57);
    }

    #[test]
    fn test_round_trips_through_destination_json() {
        let record = sample();
        let json = serde_json::to_string(&record).unwrap();
        let back: BuildRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
