//! # Strata Core
//!
//! Core types, records, and error definitions for the Strata caching
//! subsystem. This crate provides the foundational abstractions shared by
//! the store adapters and the cache coordinator.

pub mod error;
pub mod record;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use record::*;
pub use result::*;

// Re-export shaku for dependency injection
pub use shaku::Interface;
