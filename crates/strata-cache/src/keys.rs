//! Cache key derivation and composition.
//!
//! Fast-tier keys are namespaced and embed the artifact and principal so
//! that one artifact's entries can be matched (and invalidated) by
//! pattern. The analysis slot additionally carries a digest of the
//! requested facet set: identical requests intentionally collide on one
//! slot.

use sha2::{Digest, Sha256};

/// Prefix for all cache keys to namespace them.
const CACHE_PREFIX: &str = "strata:cache";

/// Generate the metadata slot key for `(artifact_id, principal)`.
#[must_use]
pub fn metadata_key(artifact_id: &str, principal: &str) -> String {
    format!("{}:metadata:{}:{}", CACHE_PREFIX, artifact_id, principal)
}

/// Generate the analysis slot key for a derived analysis digest.
#[must_use]
pub fn analysis_key(artifact_id: &str, principal: &str, digest: &str) -> String {
    format!(
        "{}:analysis:{}:{}:{}",
        CACHE_PREFIX, artifact_id, principal, digest
    )
}

/// Generate the statistics slot key for a principal.
#[must_use]
pub fn stats_key(principal: &str) -> String {
    format!("{}:stats:{}", CACHE_PREFIX, principal)
}

/// Pattern matching every analysis slot of one artifact for one
/// principal.
#[must_use]
pub fn analysis_invalidation_pattern(artifact_id: &str, principal: &str) -> String {
    format!("{}:analysis:{}:{}:*", CACHE_PREFIX, artifact_id, principal)
}

/// Canonical facet order: sorted and deduplicated.
#[must_use]
pub fn normalize_facets(facets: &[String]) -> Vec<String> {
    let mut normalized = facets.to_vec();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Derive the analysis memoization key.
///
/// Deterministic across process restarts and facet-order-independent:
/// the inputs are hashed in canonical order with NUL separators, and the
/// result is a fixed-length lowercase hex digest.
#[must_use]
pub fn derive_analysis_key(artifact_id: &str, principal: &str, facets: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(artifact_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(principal.as_bytes());
    for facet in normalize_facets(facets) {
        hasher.update([0u8]);
        hasher.update(facet.as_bytes());
    }
    hex::encode(hasher.finalize())
}
