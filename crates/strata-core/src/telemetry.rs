//! Tracing subscriber initialization.
//!
//! The cache itself only emits `tracing` events; the host process decides
//! where they go. This module provides the default subscriber setup used
//! by binaries and integration harnesses.

use crate::{StrataError, StrataResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `level` is the default directive when `RUST_LOG` is unset; `format` is
/// either `"json"` or `"pretty"`. Returns an error if a global subscriber
/// is already installed.
pub fn init_tracing(level: &str, format: &str) -> StrataResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},strata=debug", level)));

    let result = if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|e| StrataError::internal(format!("Failed to install subscriber: {}", e)))?;

    tracing::info!(log_level = level, log_format = format, "Tracing initialized");
    Ok(())
}
