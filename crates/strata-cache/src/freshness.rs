//! Freshness policy.
//!
//! A record may be served when its age is inside the per-record-class TTL
//! window. Analysis records carry one extra rule: the artifact
//! modification time snapshotted at analysis time must be at least as new
//! as the modification time the caller currently observes. That lets a
//! caller invalidate by timestamp without an explicit delete, at the cost
//! of serving at most one TTL window of staleness when it does not.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use strata_core::{AnalysisRecord, MetadataRecord, UserStatsRecord};

fn within_ttl(written_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    let age = now.signed_duration_since(written_at);
    if age < TimeDelta::zero() {
        // Clock skew: a record from the future counts as age zero
        return true;
    }
    age <= TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX)
}

/// Whether a metadata record may be served.
#[must_use]
pub fn is_metadata_fresh(record: &MetadataRecord, now: DateTime<Utc>, ttl: Duration) -> bool {
    within_ttl(record.written_at, now, ttl)
}

/// Whether a statistics record may be served.
#[must_use]
pub fn is_stats_fresh(record: &UserStatsRecord, now: DateTime<Utc>, ttl: Duration) -> bool {
    within_ttl(record.written_at, now, ttl)
}

/// Whether an analysis record may be served.
///
/// When the caller supplies the artifact's current modification time, a
/// snapshot older than it makes the record stale even inside the TTL
/// window. Without one, only the age rule applies.
#[must_use]
pub fn is_analysis_fresh(
    record: &AnalysisRecord,
    now: DateTime<Utc>,
    ttl: Duration,
    current_artifact_modified: Option<DateTime<Utc>>,
) -> bool {
    if !within_ttl(record.written_at, now, ttl) {
        return false;
    }
    match current_artifact_modified {
        Some(current) => record.artifact_modified_at_snapshot >= current,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{AnalysisPayload, MetadataPayload, RiskLevel};

    const TTL: Duration = Duration::from_secs(3600);

    fn metadata_written_at(written_at: DateTime<Utc>) -> MetadataRecord {
        MetadataRecord::from_payload(
            "artifact-1",
            "alice@example.com",
            MetadataPayload {
                name: "doc".to_string(),
                mime_type: "text/plain".to_string(),
                owners: vec![],
                permissions: vec![],
                modified_time: written_at,
                created_time: written_at,
                size_bytes: 1,
                parent_ids: vec![],
            },
            written_at,
        )
    }

    fn analysis_with_snapshot(
        written_at: DateTime<Utc>,
        snapshot: DateTime<Utc>,
    ) -> AnalysisRecord {
        AnalysisRecord::from_payload(
            "digest".to_string(),
            "artifact-1",
            "alice@example.com",
            vec!["links".to_string()],
            AnalysisPayload {
                result: serde_json::json!({}),
                risk_level: RiskLevel::Low,
                external_share_count: 0,
            },
            snapshot,
            written_at,
        )
    }

    #[test]
    fn test_record_inside_ttl_is_fresh() {
        let now = Utc::now();
        let record = metadata_written_at(now - TimeDelta::seconds(120));
        assert!(is_metadata_fresh(&record, now, TTL));
    }

    #[test]
    fn test_record_just_past_ttl_is_stale() {
        let now = Utc::now();
        let record = metadata_written_at(now - TimeDelta::seconds(3601));
        assert!(!is_metadata_fresh(&record, now, TTL));
    }

    #[test]
    fn test_future_written_at_counts_as_fresh() {
        let now = Utc::now();
        let record = metadata_written_at(now + TimeDelta::seconds(30));
        assert!(is_metadata_fresh(&record, now, TTL));
    }

    #[test]
    fn test_newer_modification_beats_ttl() {
        let now = Utc::now();
        let snapshot = now - TimeDelta::seconds(600);
        let record = analysis_with_snapshot(now - TimeDelta::seconds(60), snapshot);

        // Inside the TTL window, but the artifact changed after analysis
        let current = snapshot + TimeDelta::seconds(1);
        assert!(!is_analysis_fresh(&record, now, TTL, Some(current)));

        // An unchanged artifact keeps the record fresh
        assert!(is_analysis_fresh(&record, now, TTL, Some(snapshot)));
    }

    #[test]
    fn test_missing_modification_time_falls_back_to_ttl() {
        let now = Utc::now();
        let record = analysis_with_snapshot(now - TimeDelta::seconds(60), now);
        assert!(is_analysis_fresh(&record, now, TTL, None));

        let stale = analysis_with_snapshot(now - TimeDelta::seconds(7200), now);
        assert!(!is_analysis_fresh(&stale, now, TTL, None));
    }
}
