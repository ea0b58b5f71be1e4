//! Core types and shared functionality for ogpinfo.
//!
//! This crate provides:
//! - The `Record` persisted for every retrieved URL
//! - File-backed JSON cache with key derivation and sweeping
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod record;

pub use cache::{CacheStore, SweepReport, derive_key};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use record::{NETWORK_FAILURE_STATUS, Record};
