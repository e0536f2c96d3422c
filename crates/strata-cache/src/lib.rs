//! # Strata Cache
//!
//! Two-tier caching for the workspace-scanning pipeline: a fast
//! key-value tier for repeated reads and a durable analytical tier for
//! queryable history, joined by a freshness policy that combines cache
//! age with the artifact's own modification timestamp.
//!
//! The scanning pipeline calls `get_*` before each upstream fetch and
//! `set_*` after; an administrative surface uses `health_check` and
//! `invalidate_artifact`. Cache unavailability degrades latency and
//! upstream call volume, never correctness.

pub mod bootstrap;
pub mod coordinator;
pub mod freshness;
pub mod keys;
pub mod metrics;

pub use bootstrap::build_coordinator;
pub use coordinator::{ArtifactCache, CacheCoordinator, HealthReport, WriteOutcome};
pub use metrics::{register_metrics, CacheMetrics};
