//! Client code for ogpinfo.
//!
//! This crate provides the HTTP fetch capability, HTML metadata extraction,
//! and the cache-aware `Retriever` that ties them to the core cache.

pub mod extract;
pub mod fetch;
pub mod retriever;

pub use extract::{encode_numeric_entities, extract};
pub use fetch::{FetchConfig, FetchResponse, Fetcher, HttpFetcher};
pub use retriever::{Retriever, Source};
