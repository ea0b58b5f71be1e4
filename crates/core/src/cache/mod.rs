//! File-backed cache of retrieved records.
//!
//! One JSON document per URL under a configurable root directory:
//!
//! - Keys are `{host}-{sha256}.json`, derived from the URL alone
//! - Writes are atomic (temp file + rename), last writer wins
//! - Expiry is evaluated against the stored fetch timestamp at read and sweep
//!   time, so TTL changes apply to entries already on disk

pub mod key;
pub mod store;

pub use crate::Error;

pub use key::{derive_key, host_of, is_cache_key};
pub use store::{CacheStore, SweepReport};
