//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and sweeping the on-disk record cache.

pub mod get;
pub mod sweep;

pub use get::{CacheGetParams, get_impl};
pub use sweep::{CacheSweepParams, sweep_impl};
