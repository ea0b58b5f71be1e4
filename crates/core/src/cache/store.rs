//! Record persistence, expiry, and sweeping.
//!
//! Every operation tolerates other processes working on the same directory:
//! writes land via rename, and files that disappear between listing and
//! reading or deleting are treated as benign races.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::fs;

use super::key::{derive_key, is_cache_key, key_host, normalize_host};
use crate::{Error, Record};

/// Prefix of in-flight temp files inside the cache root.
const TEMP_PREFIX: &str = ".tmp-";

/// Temp files younger than this are never swept, whatever the TTL.
const TEMP_GRACE: Duration = Duration::from_secs(60);

/// Outcome of a sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SweepReport {
    /// Record files examined.
    pub scanned: u64,
    /// Expired records deleted.
    pub removed: u64,
    /// Corrupt record files deleted.
    pub corrupt: u64,
    /// Abandoned temp files deleted.
    pub temp_removed: u64,
    /// Files that vanished mid-scan (another sweep or reader got there first).
    pub vanished: u64,
    /// Entries that could not be read or deleted and were left in place.
    pub skipped: u64,
}

/// JSON-file record store rooted at one directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `root`. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub async fn exists(&self, key: &str) -> bool {
        fs::try_exists(self.path_for(key)).await.unwrap_or(false)
    }

    /// Read the record stored under `key`.
    ///
    /// Returns `Ok(None)` if there is no such entry and
    /// `Err(Error::CorruptCache)` if the file is not a well-formed record.
    /// Corrupt files are left in place; deciding their fate is up to the caller.
    pub async fn read(&self, key: &str) -> Result<Option<Record>, Error> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(Error::CacheIo { path, source }),
        };

        decode(key, &bytes).map(Some)
    }

    /// Persist `record` under the key derived from its URL.
    ///
    /// Creates the cache root if needed. The JSON is written to a temp file in
    /// the same directory and renamed over the target.
    pub async fn write(&self, record: &Record) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| Error::CacheIo { path: self.root.clone(), source })?;

        let path = self.path_for(&derive_key(record.url()));
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| Error::CacheIo { path: path.clone(), source: std::io::Error::other(e) })?;

        let temp = self.root.join(format!("{TEMP_PREFIX}{}", uuid::Uuid::new_v4()));
        if let Err(source) = fs::write(&temp, &json).await {
            fs::remove_file(&temp).await.ok();
            return Err(Error::CacheIo { path: temp, source });
        }
        if let Err(source) = fs::rename(&temp, &path).await {
            fs::remove_file(&temp).await.ok();
            return Err(Error::CacheIo { path, source });
        }

        tracing::debug!("cached {} at {}", record.url(), path.display());
        Ok(path)
    }

    /// Delete the entry for `key`. Returns whether a file was removed.
    pub async fn invalidate(&self, key: &str) -> Result<bool, Error> {
        remove(&self.path_for(key)).await
    }

    /// Delete every record that is expired under `ttl`.
    ///
    /// Corrupt record files are deleted too, as are temp files abandoned by
    /// crashed writers. A missing cache root is an empty sweep. Entries that
    /// cannot be read or deleted are logged and skipped; only failing to list
    /// the root itself is an error.
    pub async fn sweep(&self, ttl: Duration) -> Result<SweepReport, Error> {
        let now = chrono::Utc::now().timestamp();
        let mut report = SweepReport::default();

        let Some(mut dir) = self.open_root().await? else {
            return Ok(report);
        };

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|source| Error::CacheIo { path: self.root.clone(), source })?
        {
            let path = entry.path();
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            if name.starts_with(TEMP_PREFIX) {
                if is_stale_temp(&path, ttl).await {
                    let outcome = remove(&path).await;
                    tally(outcome, &mut report.temp_removed, &mut report.vanished, &mut report.skipped);
                }
                continue;
            }

            if !is_cache_key(name) {
                continue;
            }

            report.scanned += 1;
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    report.vanished += 1;
                    continue;
                }
                Err(source) => {
                    tracing::warn!(path = %path.display(), error = %source, "skipping unreadable cache entry");
                    report.skipped += 1;
                    continue;
                }
            };

            match decode(name, &bytes) {
                Ok(record) if record.is_expired_at(ttl, now) => {
                    let outcome = remove(&path).await;
                    tally(outcome, &mut report.removed, &mut report.vanished, &mut report.skipped);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "removing corrupt cache entry");
                    let outcome = remove(&path).await;
                    tally(outcome, &mut report.corrupt, &mut report.vanished, &mut report.skipped);
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            removed = report.removed,
            corrupt = report.corrupt,
            temp_removed = report.temp_removed,
            vanished = report.vanished,
            skipped = report.skipped,
            "cache sweep finished"
        );

        Ok(report)
    }

    /// Delete every record cached for `host`, regardless of age.
    ///
    /// `host` is normalized like the URL host in [`derive_key`], so
    /// `bücher.example` and `::1` match their cached entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_host(&self, host: &str) -> Result<u64, Error> {
        let host = normalize_host(host);
        let mut deleted = 0u64;

        for key in self.entries().await? {
            if key_host(&key) == Some(host.as_str()) && remove(&self.path_for(&key)).await? {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    /// Keys of all records currently on disk, sorted.
    pub async fn entries(&self) -> Result<Vec<String>, Error> {
        let mut keys = Vec::new();
        let Some(mut dir) = self.open_root().await? else {
            return Ok(keys);
        };

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|source| Error::CacheIo { path: self.root.clone(), source })?
        {
            if let Some(name) = entry.file_name().to_str()
                && is_cache_key(name)
            {
                keys.push(name.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn open_root(&self) -> Result<Option<fs::ReadDir>, Error> {
        match fs::read_dir(&self.root).await {
            Ok(dir) => Ok(Some(dir)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::CacheIo { path: self.root.clone(), source }),
        }
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<Record, Error> {
    let record: Record = serde_json::from_slice(bytes)
        .map_err(|e| Error::CorruptCache { key: key.to_string(), reason: e.to_string() })?;

    if record.timestamp().is_none() {
        return Err(Error::CorruptCache { key: key.to_string(), reason: "missing timestamp".to_string() });
    }

    Ok(record)
}

/// Remove a file, reporting `false` if it was already gone.
async fn remove(path: &Path) -> Result<bool, Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(Error::CacheIo { path: path.to_path_buf(), source }),
    }
}

fn tally(outcome: Result<bool, Error>, hit: &mut u64, vanished: &mut u64, skipped: &mut u64) {
    match outcome {
        Ok(true) => *hit += 1,
        Ok(false) => *vanished += 1,
        Err(err) => {
            tracing::warn!(error = %err, "sweep could not delete cache entry");
            *skipped += 1;
        }
    }
}

async fn is_stale_temp(path: &Path, ttl: Duration) -> bool {
    let Ok(modified) = fs::metadata(path).await.and_then(|meta| meta.modified()) else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age > ttl.max(TEMP_GRACE))
}
