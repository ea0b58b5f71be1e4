//! HTTP fetch capability.
//!
//! ### Contract
//! - Follow redirects up to a bound (default: 5) and report the final status
//! - Non-2xx responses come back as a status, never as an error
//! - Transport failures (DNS, connect, TLS, timeout) map to status 0
//!
//! ### Limits
//! - Request timeout: 15s (configurable)
//! - Max body bytes: 5MB (configurable); longer bodies are truncated, since
//!   the metadata of interest lives in `<head>`

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, header};

use ogpinfo_core::{AppConfig, Error, NETWORK_FAILURE_STATUS};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "ogpinfo/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 15s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Whether to verify TLS certificates (default: true)
    pub verify_tls: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "ogpinfo/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(15000),
            max_redirects: 5,
            verify_tls: true,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
            verify_tls: config.verify_tls,
        }
    }
}

/// Result of one fetch attempt.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final HTTP status, or 0 if no response was received
    pub status: u16,
    /// Response body bytes (possibly truncated)
    pub body: Bytes,
}

impl FetchResponse {
    /// A response standing in for a transport failure.
    pub fn network_failure() -> Self {
        Self { status: NETWORK_FAILURE_STATUS, body: Bytes::new() }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Capability to fetch a URL.
///
/// Implementations never fail: every outcome is expressed as a status.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResponse;
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .danger_accept_invalid_certs(!config.verify_tls)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpClient(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Read the body chunk by chunk, stopping at `max_bytes`.
    async fn read_body(&self, mut response: reqwest::Response) -> Result<Bytes, reqwest::Error> {
        let mut body = BytesMut::new();

        while let Some(chunk) = response.chunk().await? {
            let remaining = self.config.max_bytes - body.len();
            if chunk.len() > remaining {
                body.extend_from_slice(&chunk[..remaining]);
                tracing::debug!("truncated response body at {} bytes", self.config.max_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResponse {
        let start = Instant::now();

        let request = self.http.get(url).header(
            header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        );

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, timeout = e.is_timeout(), fetch_ms = elapsed_ms(start), error = %e, "fetch failed");
                return FetchResponse::network_failure();
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let body = match self.read_body(response).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url, timeout = e.is_timeout(), error = %e, "failed to read response body");
                return FetchResponse::network_failure();
            }
        };

        let fetch_ms = elapsed_ms(start);

        tracing::debug!("fetched {} -> {} [{}] in {}ms ({} bytes)", url, final_url, status, fetch_ms, body.len());

        FetchResponse { status, body }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
