//! Two-tier cache coordinator.
//!
//! Reads go fast tier → durable tier → repopulate fast tier. Writes fan
//! out to both tiers concurrently. The two tiers have asymmetric
//! contracts: the fast tier is the success channel, the durable tier is
//! best-effort history. Steady-state store failures are absorbed here
//! and surface only through logs, metrics, and `health_check`; a
//! degraded cache changes latency and upstream call volume, never scan
//! correctness.

use crate::{freshness, keys, metrics::CacheMetrics};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use shaku::Component;
use std::sync::Arc;
use std::time::Duration;
use strata_config::CacheTtlConfig;
use strata_core::{
    AnalysisPayload, AnalysisRecord, Interface, MetadataPayload, MetadataRecord, StrataError,
    StrataResult, UserStatsPayload, UserStatsRecord,
};
use strata_store::{DurableStore, FastStore};
use tracing::{debug, info, warn};

/// Per-tier outcome of a producer write.
///
/// Neither tier's failure fails the call; this is the explicit two-channel
/// report. `fast_written` is the channel that matters for cache
/// effectiveness, `durable_written` for long-term history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    /// The fast tier accepted the record.
    pub fast_written: bool,
    /// The durable tier accepted the record (or is disabled).
    pub durable_written: bool,
}

impl WriteOutcome {
    /// True when both tiers accepted the record.
    #[must_use]
    pub const fn fully_written(&self) -> bool {
        self.fast_written && self.durable_written
    }
}

/// Independent per-tier health, for the readiness surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub fast_store_ok: bool,
    pub durable_store_ok: bool,
}

/// Public API of the caching subsystem.
///
/// `get_*` never error: anything unusable (missing, stale, malformed, or
/// a tier being down) is a `None`, and the caller re-fetches upstream and
/// calls the matching `set_*`.
#[async_trait]
pub trait ArtifactCache: Interface + Send + Sync {
    /// Ensure the durable schema exists. Startup-only; the only window
    /// where failures propagate.
    async fn initialize(&self) -> StrataResult<()>;

    /// Look up artifact metadata for `(artifact_id, principal)`.
    async fn get_metadata(&self, artifact_id: &str, principal: &str) -> Option<MetadataRecord>;

    /// Store artifact metadata, stamping write time and schema version.
    async fn set_metadata(
        &self,
        artifact_id: &str,
        principal: &str,
        payload: MetadataPayload,
    ) -> WriteOutcome;

    /// Look up a memoized analysis result.
    ///
    /// `current_artifact_modified` is the artifact modification time the
    /// caller currently observes; supplying it invalidates-by-timestamp.
    async fn get_analysis(
        &self,
        artifact_id: &str,
        principal: &str,
        facets: &[String],
        current_artifact_modified: Option<DateTime<Utc>>,
    ) -> Option<AnalysisRecord>;

    /// Store an analysis result under the derived key.
    async fn set_analysis(
        &self,
        artifact_id: &str,
        principal: &str,
        facets: &[String],
        payload: AnalysisPayload,
        artifact_modified_at: DateTime<Utc>,
    ) -> WriteOutcome;

    /// Look up per-principal scan statistics.
    async fn get_user_stats(&self, principal: &str) -> Option<UserStatsRecord>;

    /// Store per-principal scan statistics.
    async fn set_user_stats(&self, principal: &str, payload: UserStatsPayload) -> WriteOutcome;

    /// Drop the fast-tier entries of one artifact: its metadata slot and
    /// every analysis slot. Durable rows are left as append-only history
    /// and age out via the freshness policy. Returns the number of keys
    /// removed.
    async fn invalidate_artifact(&self, artifact_id: &str, principal: &str) -> u64;

    /// Ping both tiers independently. Never errors.
    async fn health_check(&self) -> HealthReport;

    /// Release the fast-store connection. Idempotent.
    fn close(&self);
}

/// The one cache instance a process owns, wired to both tiers.
#[derive(Component)]
#[shaku(interface = ArtifactCache)]
pub struct CacheCoordinator {
    #[shaku(inject)]
    fast: Arc<dyn FastStore>,
    #[shaku(inject)]
    durable: Arc<dyn DurableStore>,
    /// Per-record-class freshness windows.
    ttls: CacheTtlConfig,
}

impl CacheCoordinator {
    /// Creates a coordinator over the given tier adapters.
    #[must_use]
    pub fn new(
        fast: Arc<dyn FastStore>,
        durable: Arc<dyn DurableStore>,
        ttls: CacheTtlConfig,
    ) -> Self {
        Self {
            fast,
            durable,
            ttls,
        }
    }

    /// Fast-tier read; any error or undecodable blob is a miss.
    async fn read_fast<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.fast.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Malformed fast-tier record at '{}': {}", key, e);
                    CacheMetrics::malformed_record("fast");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Fast tier read failed for '{}': {}", key, e);
                CacheMetrics::store_error("fast", "get");
                None
            }
        }
    }

    /// Durable-tier read; unwraps the result, logging and counting
    /// failures as misses.
    fn note_durable_read<T>(result: StrataResult<Option<T>>, key_label: &str) -> Option<T> {
        match result {
            Ok(found) => found,
            Err(StrataError::MalformedRecord { key, message }) => {
                warn!("Malformed durable-tier record at '{}': {}", key, message);
                CacheMetrics::malformed_record("durable");
                None
            }
            Err(e) => {
                warn!("Durable tier read failed for '{}': {}", key_label, e);
                CacheMetrics::store_error("durable", "query");
                None
            }
        }
    }

    /// Best-effort fast-tier repopulation after a durable hit.
    async fn repopulate<T: Serialize>(&self, key: &str, record: &T, ttl: Duration) {
        let raw = match serde_json::to_string(record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize record for repopulation: {}", e);
                return;
            }
        };
        if let Err(e) = self.fast.set_with_expiry(key, &raw, ttl).await {
            debug!("Fast tier repopulation failed for '{}': {}", key, e);
            CacheMetrics::store_error("fast", "set");
        }
    }

    /// Fan a serialized record out to both tiers and join the results
    /// into the two-channel outcome.
    async fn write_both<F>(
        &self,
        kind: &'static str,
        key: &str,
        record: &impl Serialize,
        ttl: Duration,
        durable_write: F,
    ) -> WriteOutcome
    where
        F: std::future::Future<Output = StrataResult<()>>,
    {
        let raw = match serde_json::to_string(record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize {} record: {}", kind, e);
                return WriteOutcome {
                    fast_written: false,
                    durable_written: false,
                };
            }
        };

        let (fast_result, durable_result) =
            tokio::join!(self.fast.set_with_expiry(key, &raw, ttl), durable_write);

        let fast_written = match fast_result {
            Ok(()) => true,
            Err(e) => {
                warn!("Fast tier write failed for {} '{}': {}", kind, key, e);
                CacheMetrics::store_error("fast", "set");
                false
            }
        };

        let durable_written = match durable_result {
            Ok(()) => true,
            Err(StrataError::QuotaRejected(message)) => {
                warn!("Durable tier rejected {} write on quota: {}", kind, message);
                CacheMetrics::quota_rejected(kind);
                false
            }
            Err(e) => {
                warn!("Durable tier write failed for {}: {}", kind, e);
                CacheMetrics::store_error("durable", "insert");
                false
            }
        };

        CacheMetrics::write(kind, fast_written, durable_written);
        WriteOutcome {
            fast_written,
            durable_written,
        }
    }
}

#[async_trait]
impl ArtifactCache for CacheCoordinator {
    async fn initialize(&self) -> StrataResult<()> {
        self.durable.ensure_schema().await?;
        info!("Cache coordinator initialized");
        Ok(())
    }

    async fn get_metadata(&self, artifact_id: &str, principal: &str) -> Option<MetadataRecord> {
        let key = keys::metadata_key(artifact_id, principal);
        let ttl = self.ttls.metadata_ttl();
        let now = Utc::now();

        if let Some(record) = self.read_fast::<MetadataRecord>(&key).await {
            if freshness::is_metadata_fresh(&record, now, ttl) {
                debug!("Metadata served from fast tier: {}", key);
                CacheMetrics::hit("metadata", "fast");
                return Some(record);
            }
        }

        let record = Self::note_durable_read(
            self.durable.latest_metadata(artifact_id, principal).await,
            &key,
        )?;
        if !freshness::is_metadata_fresh(&record, now, ttl) {
            CacheMetrics::miss("metadata");
            return None;
        }

        debug!("Metadata served from durable tier: {}", key);
        CacheMetrics::hit("metadata", "durable");
        self.repopulate(&key, &record, ttl).await;
        Some(record)
    }

    async fn set_metadata(
        &self,
        artifact_id: &str,
        principal: &str,
        payload: MetadataPayload,
    ) -> WriteOutcome {
        let record = MetadataRecord::from_payload(artifact_id, principal, payload, Utc::now());
        let key = keys::metadata_key(artifact_id, principal);
        self.write_both(
            "metadata",
            &key,
            &record,
            self.ttls.metadata_ttl(),
            self.durable.insert_metadata(&record),
        )
        .await
    }

    async fn get_analysis(
        &self,
        artifact_id: &str,
        principal: &str,
        facets: &[String],
        current_artifact_modified: Option<DateTime<Utc>>,
    ) -> Option<AnalysisRecord> {
        let digest = keys::derive_analysis_key(artifact_id, principal, facets);
        let key = keys::analysis_key(artifact_id, principal, &digest);
        let ttl = self.ttls.analysis_ttl();
        let now = Utc::now();

        if let Some(record) = self.read_fast::<AnalysisRecord>(&key).await {
            if freshness::is_analysis_fresh(&record, now, ttl, current_artifact_modified) {
                debug!("Analysis served from fast tier: {}", key);
                CacheMetrics::hit("analysis", "fast");
                return Some(record);
            }
        }

        let record =
            Self::note_durable_read(self.durable.latest_analysis(&digest).await, &key)?;
        if !freshness::is_analysis_fresh(&record, now, ttl, current_artifact_modified) {
            CacheMetrics::miss("analysis");
            return None;
        }

        debug!("Analysis served from durable tier: {}", key);
        CacheMetrics::hit("analysis", "durable");
        self.repopulate(&key, &record, ttl).await;
        Some(record)
    }

    async fn set_analysis(
        &self,
        artifact_id: &str,
        principal: &str,
        facets: &[String],
        payload: AnalysisPayload,
        artifact_modified_at: DateTime<Utc>,
    ) -> WriteOutcome {
        let normalized = keys::normalize_facets(facets);
        let digest = keys::derive_analysis_key(artifact_id, principal, &normalized);
        let key = keys::analysis_key(artifact_id, principal, &digest);
        let record = AnalysisRecord::from_payload(
            digest,
            artifact_id,
            principal,
            normalized,
            payload,
            artifact_modified_at,
            Utc::now(),
        );
        self.write_both(
            "analysis",
            &key,
            &record,
            self.ttls.analysis_ttl(),
            self.durable.insert_analysis(&record),
        )
        .await
    }

    async fn get_user_stats(&self, principal: &str) -> Option<UserStatsRecord> {
        let key = keys::stats_key(principal);
        let ttl = self.ttls.stats_ttl();
        let now = Utc::now();

        if let Some(record) = self.read_fast::<UserStatsRecord>(&key).await {
            if freshness::is_stats_fresh(&record, now, ttl) {
                debug!("Stats served from fast tier: {}", key);
                CacheMetrics::hit("stats", "fast");
                return Some(record);
            }
        }

        let record =
            Self::note_durable_read(self.durable.latest_stats(principal).await, &key)?;
        if !freshness::is_stats_fresh(&record, now, ttl) {
            CacheMetrics::miss("stats");
            return None;
        }

        debug!("Stats served from durable tier: {}", key);
        CacheMetrics::hit("stats", "durable");
        self.repopulate(&key, &record, ttl).await;
        Some(record)
    }

    async fn set_user_stats(&self, principal: &str, payload: UserStatsPayload) -> WriteOutcome {
        let record = UserStatsRecord::from_payload(principal, payload, Utc::now());
        let key = keys::stats_key(principal);
        self.write_both(
            "stats",
            &key,
            &record,
            self.ttls.stats_ttl(),
            self.durable.insert_stats(&record),
        )
        .await
    }

    async fn invalidate_artifact(&self, artifact_id: &str, principal: &str) -> u64 {
        let mut removed = 0u64;

        match self.fast.delete(&keys::metadata_key(artifact_id, principal)).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("Invalidation delete failed: {}", e);
                CacheMetrics::store_error("fast", "delete");
            }
        }

        let pattern = keys::analysis_invalidation_pattern(artifact_id, principal);
        match self.fast.keys_matching(&pattern).await {
            Ok(matched) => {
                for key in matched {
                    match self.fast.delete(&key).await {
                        Ok(true) => removed += 1,
                        Ok(false) => {}
                        Err(e) => {
                            warn!("Invalidation delete failed for '{}': {}", key, e);
                            CacheMetrics::store_error("fast", "delete");
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Invalidation scan failed for '{}': {}", pattern, e);
                CacheMetrics::store_error("fast", "keys");
            }
        }

        info!(
            "Invalidated {} fast-tier entries for {} / {}",
            removed, artifact_id, principal
        );
        CacheMetrics::invalidated(removed);
        removed
    }

    async fn health_check(&self) -> HealthReport {
        let (fast, durable) = tokio::join!(self.fast.ping(), self.durable.health_probe());

        if let Err(e) = &fast {
            warn!("Fast tier health check failed: {}", e);
        }
        if let Err(e) = &durable {
            warn!("Durable tier health check failed: {}", e);
        }

        HealthReport {
            fast_store_ok: fast.is_ok(),
            durable_store_ok: durable.is_ok(),
        }
    }

    fn close(&self) {
        self.fast.close();
    }
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}
