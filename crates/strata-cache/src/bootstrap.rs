//! Coordinator assembly from configuration.
//!
//! A process builds exactly one coordinator at startup and passes it by
//! reference to its consumers. This is the only window where failures are
//! fatal: an unreachable durable tier or a failed schema ensure
//! propagates here, while everything after startup degrades instead.

use crate::coordinator::{ArtifactCache, CacheCoordinator};
use std::sync::Arc;
use strata_config::AppConfig;
use strata_core::StrataResult;
use strata_store::{PostgresDurableStore, RedisFastStore};
use tracing::info;

/// Build a coordinator wired to the configured tiers and ensure the
/// durable schema.
pub async fn build_coordinator(config: &AppConfig) -> StrataResult<CacheCoordinator> {
    let fast = RedisFastStore::connect(&config.fast_store)?;

    let durable = if config.durable_store.enabled {
        PostgresDurableStore::connect(&config.durable_store).await?
    } else {
        info!("Durable tier disabled; running single-tier fast cache");
        PostgresDurableStore::disabled()
    };

    let coordinator = CacheCoordinator::new(
        Arc::new(fast),
        Arc::new(durable),
        config.cache.clone(),
    );
    coordinator.initialize().await?;

    Ok(coordinator)
}
