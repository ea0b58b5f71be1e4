//! The unit of retrieved metadata for one URL.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Status recorded when no HTTP response was received (DNS, connect, TLS, timeout).
pub const NETWORK_FAILURE_STATUS: u16 = 0;

/// Metadata retrieved from one URL, as cached on disk.
///
/// Serialized as `{ "url", "httpStatus", "timestamp", "values" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    url: String,
    #[serde(default)]
    http_status: u16,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

impl Record {
    /// A record that has not been fetched yet.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), http_status: NETWORK_FAILURE_STATUS, timestamp: None, values: BTreeMap::new() }
    }

    /// A record for a completed fetch attempt at `fetched_at` (epoch seconds).
    ///
    /// Values are dropped unless the status is 200.
    pub fn fetched(
        url: impl Into<String>, http_status: u16, values: BTreeMap<String, String>, fetched_at: i64,
    ) -> Self {
        let values = if http_status == 200 { values } else { BTreeMap::new() };
        Self { url: url.into(), http_status, timestamp: Some(fetched_at), values }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn is_success(&self) -> bool {
        self.http_status == 200
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Value for `key`, or the empty string when absent.
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    /// Whether the record is older than `ttl` right now.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.is_expired_at(ttl, chrono::Utc::now().timestamp())
    }

    /// Whether `now > timestamp + ttl`. A zero TTL expires every fetched
    /// record immediately; unfetched records never expire.
    pub fn is_expired_at(&self, ttl: Duration, now: i64) -> bool {
        match self.timestamp {
            Some(_) if ttl.is_zero() => true,
            Some(fetched_at) => {
                let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
                now > fetched_at.saturating_add(ttl)
            }
            None => false,
        }
    }

    /// Page title: `og:title`, then `twitter:title`, then `<title>`.
    pub fn title(&self) -> Option<&str> {
        self.first_of(&["og:title", "twitter:title", "title"])
    }

    /// Page description: `og:description`, then `twitter:description`, then `<meta name="description">`.
    pub fn description(&self) -> Option<&str> {
        self.first_of(&["og:description", "twitter:description", "description"])
    }

    /// Preview image: `og:image`, then `twitter:image`.
    pub fn image(&self) -> Option<&str> {
        self.first_of(&["og:image", "twitter:image"])
    }

    pub fn site_name(&self) -> Option<&str> {
        self.first_of(&["og:site_name"])
    }

    /// Site icon: `icon`, then `apple-touch-icon`.
    pub fn icon(&self) -> Option<&str> {
        self.first_of(&["icon", "apple-touch-icon"])
    }

    fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().map(|key| self.get(key)).find(|value| !value.is_empty())
    }
}
