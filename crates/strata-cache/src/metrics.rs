//! Prometheus metrics for cache monitoring.
//!
//! The coordinator absorbs steady-state store failures, so these counters
//! (together with the health check) are how a degraded tier becomes
//! visible. Exporter installation belongs to the host process.

use metrics::{counter, describe_counter};

/// Metric names for the caching subsystem.
pub mod names {
    /// Total cache hits, labeled by record kind and serving tier.
    pub const CACHE_HITS_TOTAL: &str = "strata_cache_hits_total";
    /// Total cache misses, labeled by record kind.
    pub const CACHE_MISSES_TOTAL: &str = "strata_cache_misses_total";
    /// Total producer writes, labeled by record kind and per-tier outcome.
    pub const CACHE_WRITES_TOTAL: &str = "strata_cache_writes_total";
    /// Total absorbed store errors, labeled by tier and operation.
    pub const STORE_ERRORS_TOTAL: &str = "strata_cache_store_errors_total";
    /// Total durable writes rejected on quota limits.
    pub const QUOTA_REJECTED_TOTAL: &str = "strata_cache_quota_rejected_total";
    /// Total stored blobs that failed to deserialize.
    pub const MALFORMED_RECORDS_TOTAL: &str = "strata_cache_malformed_records_total";
    /// Total fast-tier keys removed by explicit invalidation.
    pub const INVALIDATED_KEYS_TOTAL: &str = "strata_cache_invalidated_keys_total";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        names::CACHE_HITS_TOTAL,
        "Total number of cache hits by record kind and tier"
    );
    describe_counter!(
        names::CACHE_MISSES_TOTAL,
        "Total number of cache misses by record kind"
    );
    describe_counter!(
        names::CACHE_WRITES_TOTAL,
        "Total number of producer writes by record kind and tier outcome"
    );
    describe_counter!(
        names::STORE_ERRORS_TOTAL,
        "Total number of absorbed store errors by tier and operation"
    );
    describe_counter!(
        names::QUOTA_REJECTED_TOTAL,
        "Total number of durable writes rejected on quota limits"
    );
    describe_counter!(
        names::MALFORMED_RECORDS_TOTAL,
        "Total number of stored blobs that failed to deserialize"
    );
    describe_counter!(
        names::INVALIDATED_KEYS_TOTAL,
        "Total number of fast-tier keys removed by invalidation"
    );
}

/// Cache metrics recorder.
#[derive(Clone)]
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a hit served from one of the tiers.
    pub fn hit(kind: &'static str, tier: &'static str) {
        counter!(
            names::CACHE_HITS_TOTAL,
            "kind" => kind,
            "tier" => tier
        )
        .increment(1);
    }

    /// Record a miss (nothing usable in either tier).
    pub fn miss(kind: &'static str) {
        counter!(names::CACHE_MISSES_TOTAL, "kind" => kind).increment(1);
    }

    /// Record a producer write and its per-tier outcome.
    pub fn write(kind: &'static str, fast_written: bool, durable_written: bool) {
        counter!(
            names::CACHE_WRITES_TOTAL,
            "kind" => kind,
            "fast" => outcome(fast_written),
            "durable" => outcome(durable_written)
        )
        .increment(1);
    }

    /// Record an absorbed store error.
    pub fn store_error(tier: &'static str, operation: &'static str) {
        counter!(
            names::STORE_ERRORS_TOTAL,
            "tier" => tier,
            "operation" => operation
        )
        .increment(1);
    }

    /// Record a quota-rejected durable write.
    pub fn quota_rejected(kind: &'static str) {
        counter!(names::QUOTA_REJECTED_TOTAL, "kind" => kind).increment(1);
    }

    /// Record a stored blob that failed to deserialize.
    pub fn malformed_record(tier: &'static str) {
        counter!(names::MALFORMED_RECORDS_TOTAL, "tier" => tier).increment(1);
    }

    /// Record the keys removed by one invalidation call.
    pub fn invalidated(removed: u64) {
        counter!(names::INVALIDATED_KEYS_TOTAL).increment(removed);
    }
}

fn outcome(written: bool) -> &'static str {
    if written {
        "ok"
    } else {
        "failed"
    }
}
