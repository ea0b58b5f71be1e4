//! Cache-aware metadata retrieval.
//!
//! For each URL:
//! 1. Look up the record under its derived key; return it untouched if valid.
//! 2. Expired or corrupt entries are deleted and handled as a miss.
//! 3. On a miss, fetch the page. A 200 response is normalized and run through
//!    the extractor; any other outcome keeps only the status.
//! 4. Persist the new record either way, so failing URLs are not hammered
//!    until the TTL elapses.
//!
//! Concurrent callers for the same URL may both miss and both fetch; the
//! last write wins.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ogpinfo_core::{AppConfig, CacheStore, Error, Record, SweepReport, derive_key};

use crate::extract::{encode_numeric_entities, extract};
use crate::fetch::{FetchConfig, FetchResponse, Fetcher, HttpFetcher};

/// Where a retrieved record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A valid cache entry.
    Cache,
    /// A fresh fetch (successful or not).
    Network,
}

/// Retrieves page metadata through the on-disk cache.
pub struct Retriever {
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
    ttl: Duration,
}

impl Retriever {
    pub fn new(store: CacheStore, fetcher: Arc<dyn Fetcher>, ttl: Duration) -> Self {
        Self { store, fetcher, ttl }
    }

    /// Build a retriever with an HTTP fetcher and store from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let fetcher = HttpFetcher::new(FetchConfig::from(config))?;
        Ok(Self::new(CacheStore::new(&config.cache_dir), Arc::new(fetcher), config.cache_ttl()))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Change the TTL. Applies to entries already on disk.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    /// Point the retriever at another cache directory. Existing files stay where they are.
    pub fn set_cache_dir(&mut self, dir: impl Into<std::path::PathBuf>) {
        self.store = CacheStore::new(dir);
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Retrieve metadata for `url`, from cache when valid.
    ///
    /// Fetch failures are not errors; they show up in the record's status.
    ///
    /// # Errors
    ///
    /// Returns `Error::PersistFailed` if the fresh record could not be written
    /// to the cache. The record is carried by the error.
    pub async fn retrieve(&self, url: &str) -> Result<Record, Error> {
        self.retrieve_with_source(url).await.map(|(record, _)| record)
    }

    /// Like [`Retriever::retrieve`], also reporting whether the cache answered.
    pub async fn retrieve_with_source(&self, url: &str) -> Result<(Record, Source), Error> {
        let key = derive_key(url);

        if let Some(record) = self.lookup(url, &key).await {
            tracing::debug!("cache hit for {}", url);
            return Ok((record, Source::Cache));
        }

        tracing::debug!("cache miss for {}", url);
        let response = self.fetcher.fetch(url).await;
        let record = build_record(url, &response);

        match self.store.write(&record).await {
            Ok(_) => Ok((record, Source::Network)),
            Err(err) => {
                tracing::error!(url, error = %err, "failed to persist record");
                Err(Error::PersistFailed { record: Box::new(record), source: Box::new(err) })
            }
        }
    }

    /// The valid cached record for `url`, without fetching.
    pub async fn cached(&self, url: &str) -> Option<Record> {
        self.lookup(url, &derive_key(url)).await
    }

    /// Drop the cached record for `url`. Returns whether one existed.
    pub async fn invalidate(&self, url: &str) -> Result<bool, Error> {
        self.store.invalidate(&derive_key(url)).await
    }

    /// Sweep every expired record from the cache.
    pub async fn clear_cache(&self) -> Result<SweepReport, Error> {
        self.store.sweep(self.ttl).await
    }

    /// Drop every cached record for `host`.
    pub async fn purge_host(&self, host: &str) -> Result<u64, Error> {
        self.store.purge_host(host).await
    }

    async fn lookup(&self, url: &str, key: &str) -> Option<Record> {
        match self.store.read(key).await {
            Ok(Some(record)) if record.url() != url => {
                tracing::warn!(key, cached_url = record.url(), url, "cache key collision, refetching");
                None
            }
            Ok(Some(record)) if record.is_expired(self.ttl) => {
                tracing::debug!("cache entry for {} expired", url);
                self.discard(key).await;
                None
            }
            Ok(Some(record)) => Some(record),
            Ok(None) => None,
            Err(err @ Error::CorruptCache { .. }) => {
                tracing::warn!(key, error = %err, "discarding corrupt cache entry");
                self.discard(key).await;
                None
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed, refetching");
                None
            }
        }
    }

    async fn discard(&self, key: &str) {
        if let Err(err) = self.store.invalidate(key).await {
            tracing::warn!(key, error = %err, "failed to delete cache entry");
        }
    }
}

fn build_record(url: &str, response: &FetchResponse) -> Record {
    let fetched_at = Utc::now().timestamp();

    if !response.is_ok() {
        tracing::debug!("fetch of {} returned status {}", url, response.status);
        return Record::fetched(url, response.status, BTreeMap::new(), fetched_at);
    }

    let html = encode_numeric_entities(&response.body);
    let values = extract(&html, url);
    Record::fetched(url, response.status, values, fetched_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use ogpinfo_core::NETWORK_FAILURE_STATUS;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    const PAGE: &str = r#"<!DOCTYPE html>
        <html><head>
            <title>Test Title</title>
            <meta property="og:title" content="Test OG Title">
            <link rel="icon" href="/favicon.ico">
        </head><body></body></html>"#;

    const URL: &str = "http://localhost:8000/path/test.html";

    /// Fetcher returning a fixed response and counting calls.
    struct ScriptedFetcher {
        status: u16,
        body: &'static str,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self { status, body, calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> FetchResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            FetchResponse { status: self.status, body: Bytes::from_static(self.body.as_bytes()) }
        }
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    #[tokio::test]
    async fn test_retrieve_success_is_persisted() {
        let dir = tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(200, PAGE);
        let retriever = Retriever::new(CacheStore::new(dir.path()), fetcher.clone(), Duration::from_secs(60));

        let record = retriever.retrieve(URL).await.unwrap();
        assert_eq!(record.url(), URL);
        assert_eq!(record.http_status(), 200);
        assert_eq!(record.get("title"), "Test Title");
        assert_eq!(record.get("og:title"), "Test OG Title");
        assert_eq!(record.get("icon"), "http://localhost:8000/favicon.ico");
        assert_eq!(record.get("twitter:card"), "");
        assert!(record.timestamp().is_some());

        let path = retriever.store().path_for(&derive_key(URL));
        assert!(path.exists());
        let persisted: Record = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(persisted, record);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_twice_within_ttl_uses_cache() {
        let dir = tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(200, PAGE);
        let retriever = Retriever::new(CacheStore::new(dir.path()), fetcher.clone(), Duration::from_secs(60));

        let (first, first_source) = retriever.retrieve_with_source(URL).await.unwrap();
        let (second, second_source) = retriever.retrieve_with_source(URL).await.unwrap();

        assert_eq!(first_source, Source::Network);
        assert_eq!(second_source, Source::Cache);
        assert_eq!(first.timestamp(), second.timestamp());
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let dir = tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(404, "<title>Not Found</title>");
        let retriever = Retriever::new(CacheStore::new(dir.path()), fetcher.clone(), Duration::from_secs(60));

        let record = retriever.retrieve(URL).await.unwrap();
        assert_eq!(record.http_status(), 404);
        assert!(record.values().is_empty());
        assert_eq!(record.get("title"), "");
        assert!(retriever.store().exists(&derive_key(URL)).await);

        let again = retriever.retrieve(URL).await.unwrap();
        assert_eq!(again.http_status(), 404);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_is_cached() {
        let dir = tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(NETWORK_FAILURE_STATUS, "");
        let retriever = Retriever::new(CacheStore::new(dir.path()), fetcher.clone(), Duration::from_secs(60));

        let record = retriever.retrieve(URL).await.unwrap();
        assert_eq!(record.http_status(), NETWORK_FAILURE_STATUS);
        assert!(record.timestamp().is_some());

        retriever.retrieve(URL).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_forces_refetch() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let old = Record::fetched(URL, 200, BTreeMap::new(), now() - 10);
        store.write(&old).await.unwrap();

        let fetcher = ScriptedFetcher::new(200, PAGE);
        let retriever = Retriever::new(store, fetcher.clone(), Duration::ZERO);

        let record = retriever.retrieve(URL).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert!(record.timestamp().unwrap() > old.timestamp().unwrap());
        assert_eq!(record.get("og:title"), "Test OG Title");
    }

    #[tokio::test]
    async fn test_zero_ttl_refetches_immediately() {
        let dir = tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(200, PAGE);
        let mut retriever = Retriever::new(CacheStore::new(dir.path()), fetcher.clone(), Duration::from_secs(60));

        let first = retriever.retrieve(URL).await.unwrap();
        retriever.set_ttl(Duration::ZERO);
        retriever.retrieve(URL).await.unwrap();
        assert_eq!(fetcher.calls(), 2);

        let fetched_at = first.timestamp().unwrap();
        while now() <= fetched_at {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let third = retriever.retrieve(URL).await.unwrap();
        assert_eq!(fetcher.calls(), 3);
        assert!(third.timestamp().unwrap() > fetched_at);
    }

    #[tokio::test]
    async fn test_ttl_change_applies_to_cached_entries() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.write(&Record::fetched(URL, 200, BTreeMap::new(), now() - 120)).await.unwrap();

        let fetcher = ScriptedFetcher::new(200, PAGE);
        let mut retriever = Retriever::new(store, fetcher.clone(), Duration::from_secs(3_600));

        retriever.retrieve(URL).await.unwrap();
        assert_eq!(fetcher.calls(), 0);

        retriever.set_ttl(Duration::from_secs(60));
        assert_eq!(retriever.ttl(), Duration::from_secs(60));
        retriever.retrieve(URL).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_set_cache_dir() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(200, PAGE);
        let mut retriever = Retriever::new(CacheStore::new(first.path()), fetcher.clone(), Duration::from_secs(60));

        retriever.retrieve(URL).await.unwrap();
        retriever.set_cache_dir(second.path());
        assert_eq!(retriever.store().root(), second.path());

        retriever.retrieve(URL).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
        assert!(first.path().join(derive_key(URL)).exists());
        assert!(second.path().join(derive_key(URL)).exists());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_replaced() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let path = store.path_for(&derive_key(URL));
        std::fs::write(&path, b"{ definitely not a record").unwrap();

        let fetcher = ScriptedFetcher::new(200, PAGE);
        let retriever = Retriever::new(store, fetcher.clone(), Duration::from_secs(60));

        let record = retriever.retrieve(URL).await.unwrap();
        assert_eq!(record.http_status(), 200);
        assert_eq!(fetcher.calls(), 1);

        let persisted: Record = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(persisted, record);
    }

    #[tokio::test]
    async fn test_unicode_page() {
        let dir = tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(200, r#"<title>日本語のページ</title><meta property="og:title" content="Ünïcödé">"#);
        let retriever = Retriever::new(CacheStore::new(dir.path()), fetcher, Duration::from_secs(60));

        let record = retriever.retrieve(URL).await.unwrap();
        assert_eq!(record.get("title"), "日本語のページ");
        assert_eq!(record.get("og:title"), "Ünïcödé");

        let cached = retriever.cached(URL).await.unwrap();
        assert_eq!(cached.get("title"), "日本語のページ");
    }

    #[tokio::test]
    async fn test_persist_failure_returns_record() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let fetcher = ScriptedFetcher::new(200, PAGE);
        let retriever = Retriever::new(CacheStore::new(blocker.join("cache")), fetcher, Duration::from_secs(60));

        let err = retriever.retrieve(URL).await.unwrap_err();
        assert!(matches!(err, Error::PersistFailed { .. }));
        let record = err.into_record().unwrap();
        assert_eq!(record.get("title"), "Test Title");
    }

    #[tokio::test]
    async fn test_cached_and_invalidate() {
        let dir = tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(200, PAGE);
        let retriever = Retriever::new(CacheStore::new(dir.path()), fetcher.clone(), Duration::from_secs(60));

        assert!(retriever.cached(URL).await.is_none());
        retriever.retrieve(URL).await.unwrap();
        assert!(retriever.cached(URL).await.is_some());

        assert!(retriever.invalidate(URL).await.unwrap());
        assert!(retriever.cached(URL).await.is_none());
        retriever.retrieve(URL).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_clear_cache_sweeps_expired() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let stale_url = "https://example.com/stale";
        let fresh_url = "https://example.com/fresh";
        store.write(&Record::fetched(stale_url, 200, BTreeMap::new(), now() - 3_600)).await.unwrap();
        store.write(&Record::fetched(fresh_url, 200, BTreeMap::new(), now())).await.unwrap();

        let retriever = Retriever::new(store, ScriptedFetcher::new(200, PAGE), Duration::from_secs(60));
        let report = retriever.clear_cache().await.unwrap();

        assert_eq!(report.removed, 1);
        assert!(!retriever.store().exists(&derive_key(stale_url)).await);
        assert!(retriever.store().exists(&derive_key(fresh_url)).await);
    }

    #[tokio::test]
    async fn test_concurrent_retrieves_same_url() {
        let dir = tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(200, PAGE);
        let retriever = Retriever::new(CacheStore::new(dir.path()), fetcher.clone(), Duration::from_secs(60));

        let (a, b) = tokio::join!(retriever.retrieve(URL), retriever.retrieve(URL));
        assert_eq!(a.unwrap().get("og:title"), "Test OG Title");
        assert_eq!(b.unwrap().get("og:title"), "Test OG Title");
        assert!((1..=2).contains(&fetcher.calls()));
        assert_eq!(retriever.store().entries().await.unwrap().len(), 1);
    }
}
