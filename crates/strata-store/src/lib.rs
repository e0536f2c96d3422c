//! # Strata Store
//!
//! Thin adapters over the two backing stores: a low-latency key-value
//! tier (Redis) and an append-oriented analytical tier (Postgres).
//! Adapters own their latency bounds and surface failures; the policy of
//! absorbing those failures belongs to the coordinator above.

pub mod durable;
pub mod fast;

pub use durable::*;
pub use fast::*;
