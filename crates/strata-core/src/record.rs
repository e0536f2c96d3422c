//! Cached record types.
//!
//! Three record kinds flow through the cache: artifact metadata, derived
//! analysis results, and per-principal scan statistics. Producers hand the
//! coordinator a payload; the coordinator stamps `written_at` and
//! `schema_version` when turning it into a stored record. Records are
//! serialized as JSON at the store boundary, and a blob that no longer
//! matches these shapes is rejected as malformed rather than passed
//! through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version stamped into every stored record.
///
/// Bump when a record shape changes incompatibly; readers treat unknown
/// shapes as malformed, so old rows age out instead of breaking the scan.
pub const SCHEMA_VERSION: u32 = 1;

/// A single permission grant on an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    /// Who the grant applies to (user, group, or domain identifier).
    pub grantee: String,
    /// Role granted (reader, writer, owner, ...).
    pub role: String,
    /// Whether the artifact is discoverable through this grant.
    #[serde(default)]
    pub discoverable: bool,
}

/// Derived risk classification of an analysis result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Returns true for the highest classification.
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Producer-supplied artifact metadata, as fetched from the upstream
/// service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataPayload {
    /// Display name of the artifact.
    pub name: String,
    /// MIME type reported by the upstream service.
    pub mime_type: String,
    /// Owner identities.
    pub owners: Vec<String>,
    /// Permission grants visible to the requesting principal.
    pub permissions: Vec<PermissionEntry>,
    /// Last modification time reported upstream.
    pub modified_time: DateTime<Utc>,
    /// Creation time reported upstream.
    pub created_time: DateTime<Utc>,
    /// Content size in bytes.
    pub size_bytes: i64,
    /// Parent container ids.
    pub parent_ids: Vec<String>,
}

/// Stored artifact metadata. One logical record per
/// `(artifact_id, principal)`; the newest `written_at` wins on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub artifact_id: String,
    pub principal: String,
    pub name: String,
    pub mime_type: String,
    pub owners: Vec<String>,
    pub permissions: Vec<PermissionEntry>,
    pub modified_time: DateTime<Utc>,
    pub created_time: DateTime<Utc>,
    pub size_bytes: i64,
    pub parent_ids: Vec<String>,
    pub written_at: DateTime<Utc>,
    pub schema_version: u32,
}

impl MetadataRecord {
    /// Builds a stored record from a producer payload, stamping the write
    /// time and current schema version.
    #[must_use]
    pub fn from_payload(
        artifact_id: &str,
        principal: &str,
        payload: MetadataPayload,
        written_at: DateTime<Utc>,
    ) -> Self {
        Self {
            artifact_id: artifact_id.to_string(),
            principal: principal.to_string(),
            name: payload.name,
            mime_type: payload.mime_type,
            owners: payload.owners,
            permissions: payload.permissions,
            modified_time: payload.modified_time,
            created_time: payload.created_time,
            size_bytes: payload.size_bytes,
            parent_ids: payload.parent_ids,
            written_at,
            schema_version: SCHEMA_VERSION,
        }
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Producer-supplied analysis result for one facet set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    /// Facet-dependent result body (links, sharing facts, ...).
    pub result: serde_json::Value,
    /// Risk classification derived by the analysis layer.
    pub risk_level: RiskLevel,
    /// Number of shares crossing the workspace boundary.
    pub external_share_count: u64,
}

/// Stored analysis result, memoized per
/// `(artifact_id, principal, sorted facets)`.
///
/// `artifact_modified_at_snapshot` records the artifact's modification
/// time at analysis time; a caller presenting a newer modification time
/// makes the record stale regardless of TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub analysis_key: String,
    pub artifact_id: String,
    pub principal: String,
    pub requested_facets: Vec<String>,
    pub result: serde_json::Value,
    pub risk_level: RiskLevel,
    pub external_share_count: u64,
    pub written_at: DateTime<Utc>,
    pub artifact_modified_at_snapshot: DateTime<Utc>,
    pub schema_version: u32,
}

impl AnalysisRecord {
    /// Builds a stored record from a producer payload.
    ///
    /// `requested_facets` must already be in canonical (sorted, deduped)
    /// order; the key codec owns that normalization.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_payload(
        analysis_key: String,
        artifact_id: &str,
        principal: &str,
        requested_facets: Vec<String>,
        payload: AnalysisPayload,
        artifact_modified_at: DateTime<Utc>,
        written_at: DateTime<Utc>,
    ) -> Self {
        Self {
            analysis_key,
            artifact_id: artifact_id.to_string(),
            principal: principal.to_string(),
            requested_facets,
            result: payload.result,
            risk_level: payload.risk_level,
            external_share_count: payload.external_share_count,
            written_at,
            artifact_modified_at_snapshot: artifact_modified_at,
            schema_version: SCHEMA_VERSION,
        }
    }
}

// ============================================================================
// Per-principal statistics
// ============================================================================

/// Producer-supplied scan statistics for one principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatsPayload {
    /// Total artifacts seen in the last completed scan.
    pub total_artifacts: u64,
    /// Artifact counts keyed by MIME type.
    pub counts_by_type: BTreeMap<String, u64>,
    /// Externally shared artifacts across the whole scan.
    pub external_share_count: u64,
    /// Artifacts classified high risk.
    pub high_risk_count: u64,
    /// When the scan finished.
    pub last_scan_at: DateTime<Utc>,
    /// Wall-clock scan duration.
    pub scan_duration_seconds: f64,
}

/// Stored per-principal statistics, overwritten wholesale each scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatsRecord {
    pub principal: String,
    pub total_artifacts: u64,
    pub counts_by_type: BTreeMap<String, u64>,
    pub external_share_count: u64,
    pub high_risk_count: u64,
    pub last_scan_at: DateTime<Utc>,
    pub scan_duration_seconds: f64,
    pub written_at: DateTime<Utc>,
    pub schema_version: u32,
}

impl UserStatsRecord {
    /// Builds a stored record from a producer payload.
    #[must_use]
    pub fn from_payload(
        principal: &str,
        payload: UserStatsPayload,
        written_at: DateTime<Utc>,
    ) -> Self {
        Self {
            principal: principal.to_string(),
            total_artifacts: payload.total_artifacts,
            counts_by_type: payload.counts_by_type,
            external_share_count: payload.external_share_count,
            high_risk_count: payload.high_risk_count,
            last_scan_at: payload.last_scan_at,
            scan_duration_seconds: payload.scan_duration_seconds,
            written_at,
            schema_version: SCHEMA_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap()
    }

    fn sample_metadata_payload() -> MetadataPayload {
        MetadataPayload {
            name: "quarterly-report.xlsx".to_string(),
            mime_type: "application/vnd.ms-excel".to_string(),
            owners: vec!["alice@example.com".to_string()],
            permissions: vec![PermissionEntry {
                grantee: "bob@example.com".to_string(),
                role: "reader".to_string(),
                discoverable: false,
            }],
            modified_time: sample_time(),
            created_time: sample_time(),
            size_bytes: 4096,
            parent_ids: vec!["folder-1".to_string()],
        }
    }

    #[test]
    fn test_metadata_record_stamping() {
        let written_at = sample_time();
        let record = MetadataRecord::from_payload(
            "artifact-1",
            "alice@example.com",
            sample_metadata_payload(),
            written_at,
        );

        assert_eq!(record.artifact_id, "artifact-1");
        assert_eq!(record.principal, "alice@example.com");
        assert_eq!(record.written_at, written_at);
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert_eq!(record.name, "quarterly-report.xlsx");
    }

    #[test]
    fn test_risk_level_serializes_lowercase() {
        let json = serde_json::to_string(&RiskLevel::High).unwrap();
        assert_eq!(json, "\"high\"");
        let parsed: RiskLevel = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, RiskLevel::Low);
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High.is_high());
        assert!(!RiskLevel::Low.is_high());
    }

    #[test]
    fn test_analysis_record_keeps_snapshot() {
        let written_at = sample_time();
        let modified_at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let record = AnalysisRecord::from_payload(
            "abc123".to_string(),
            "artifact-1",
            "alice@example.com",
            vec!["links".to_string(), "sharing".to_string()],
            AnalysisPayload {
                result: serde_json::json!({"links": ["https://example.com"]}),
                risk_level: RiskLevel::Medium,
                external_share_count: 2,
            },
            modified_at,
            written_at,
        );

        assert_eq!(record.analysis_key, "abc123");
        assert_eq!(record.artifact_modified_at_snapshot, modified_at);
        assert_eq!(record.written_at, written_at);
        assert_eq!(record.requested_facets, vec!["links", "sharing"]);
    }

    #[test]
    fn test_stats_record_round_trip() {
        let mut counts = BTreeMap::new();
        counts.insert("application/pdf".to_string(), 12);
        let record = UserStatsRecord::from_payload(
            "alice@example.com",
            UserStatsPayload {
                total_artifacts: 40,
                counts_by_type: counts,
                external_share_count: 3,
                high_risk_count: 1,
                last_scan_at: sample_time(),
                scan_duration_seconds: 81.5,
            },
            sample_time(),
        );

        let json = serde_json::to_string(&record).unwrap();
        let parsed: UserStatsRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_permission_discoverable_defaults_false() {
        let parsed: PermissionEntry =
            serde_json::from_str(r#"{"grantee": "g", "role": "reader"}"#).unwrap();
        assert!(!parsed.discoverable);
    }
}
