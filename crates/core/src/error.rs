//! Unified error types for ogpinfo.
//!
//! Display strings carry a stable code prefix; the same codes are reported
//! to MCP clients.

use std::path::PathBuf;

use rmcp::model::{ErrorCode, ErrorData as McpError};

use crate::Record;

/// Unified error types for ogpinfo.
///
/// Fetch failures are not errors: they are recorded as a status on the
/// [`Record`] and cached like any other result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL list).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No cache entry found for the given URL.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// A cache file exists but does not hold a well-formed record.
    #[error("CACHE_CORRUPT: {key}: {reason}")]
    CorruptCache { key: String, reason: String },

    /// Filesystem operation on the cache directory failed.
    #[error("CACHE_ERROR: {path:?}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record was retrieved but could not be persisted.
    ///
    /// The in-memory record is kept so callers can still use it.
    #[error("CACHE_ERROR: failed to persist record: {source}")]
    PersistFailed {
        record: Box<Record>,
        #[source]
        source: Box<Error>,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP_CLIENT: {0}")]
    HttpClient(String),
}

impl Error {
    /// The record carried by a persistence failure, if any.
    pub fn into_record(self) -> Option<Record> {
        match self {
            Error::PersistFailed { record, .. } => Some(*record),
            _ => None,
        }
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::CacheMiss(_) => -32001,
            Error::CorruptCache { .. } | Error::CacheIo { .. } | Error::PersistFailed { .. } => -32002,
            Error::HttpClient(_) => -32008,
        };
        let message = match err {
            Error::InvalidInput(msg) | Error::CacheMiss(msg) | Error::HttpClient(msg) => msg,
            other => other.to_string(),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CacheMiss("https://example.com/".to_string());
        assert!(err.to_string().contains("CACHE_MISS"));
        assert!(err.to_string().contains("https://example.com/"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::CacheMiss("https://example.com/".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32001);
        assert_eq!(mcp_err.message, "https://example.com/");
    }

    #[test]
    fn test_cache_io_display() {
        let err = Error::CacheIo {
            path: PathBuf::from("/tmp/cache"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let text = err.to_string();
        assert!(text.starts_with("CACHE_ERROR"));
        assert!(text.contains("denied"));
    }

    #[test]
    fn test_persist_failed_keeps_record() {
        let record = Record::new("https://example.com/");
        let err = Error::PersistFailed {
            record: Box::new(record.clone()),
            source: Box::new(Error::CacheIo {
                path: PathBuf::from("/tmp/cache"),
                source: std::io::Error::other("disk full"),
            }),
        };
        assert!(err.to_string().contains("disk full"));
        assert_eq!(err.into_record(), Some(record));
    }

    #[test]
    fn test_into_record_other_variants() {
        assert_eq!(Error::InvalidInput("x".into()).into_record(), None);
    }
}
