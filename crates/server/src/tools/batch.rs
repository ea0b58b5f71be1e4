//! ogp_batch_retrieve tool implementation.
//!
//! Retrieves multiple URLs in parallel with bounded concurrency.

use std::sync::Arc;

use ogpinfo_client::Retriever;
use ogpinfo_core::{Error, NETWORK_FAILURE_STATUS};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::json_result;
use super::retrieve::{OgpRetrieveOutput, retrieve_output};

const DEFAULT_MAX_CONCURRENCY: u8 = 4;
const MAX_CONCURRENCY: u8 = 16;

/// Input parameters for the ogp_batch_retrieve tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OgpBatchRetrieveParams {
    /// URLs to retrieve metadata for.
    pub urls: Vec<String>,

    /// Maximum number of concurrent retrievals (default: 4, max: 16).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: Option<u8>,
}

fn default_max_concurrency() -> Option<u8> {
    Some(DEFAULT_MAX_CONCURRENCY)
}

/// Batch item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BatchItemStatus {
    /// Fetched from the network with a 200 response.
    Fetched,
    /// Returned from a valid cache entry.
    Cached,
    /// Invalid URL, non-200 status or network failure, whether fresh or cached.
    Failed,
}

/// Individual batch result item.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchItem {
    /// The original URL.
    pub url: String,
    /// Status of this item.
    pub status: BatchItemStatus,
    /// The retrieval result, present whenever a record exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OgpRetrieveOutput>,
    /// Error message (if status is Failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch summary statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BatchSummary {
    /// Total number of URLs processed.
    pub total: u32,
    /// Number of successful network retrievals.
    pub fetched: u32,
    /// Number of cached results returned.
    pub cached: u32,
    /// Number of failed retrievals.
    pub failed: u32,
}

/// Output structure for the ogp_batch_retrieve tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OgpBatchRetrieveOutput {
    /// Individual results for each URL (in input order).
    pub results: Vec<BatchItem>,
    /// Summary statistics.
    pub summary: BatchSummary,
}

/// Implementation of the ogp_batch_retrieve tool.
pub async fn batch_impl(
    retriever: &Arc<Retriever>, params: OgpBatchRetrieveParams,
) -> Result<CallToolResult, McpError> {
    if params.urls.is_empty() {
        return Err(Error::InvalidInput("urls cannot be empty".into()).into());
    }

    let max_concurrency = params.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY).min(MAX_CONCURRENCY);
    if max_concurrency == 0 {
        return Err(Error::InvalidInput("max_concurrency must be at least 1".into()).into());
    }

    let semaphore = Arc::new(Semaphore::new(usize::from(max_concurrency)));
    let mut join_set = JoinSet::new();

    for (index, url) in params.urls.into_iter().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        let retriever = retriever.clone();

        join_set.spawn(async move {
            let _permit = permit;
            let item = batch_item(&retriever, url).await;
            (index, item)
        });
    }

    let mut indexed = Vec::with_capacity(join_set.len());
    while let Some(joined) = join_set.join_next().await {
        indexed.push(joined.map_err(|e| McpError::internal_error(e.to_string(), None))?);
    }
    indexed.sort_by_key(|(index, _)| *index);

    let results: Vec<BatchItem> = indexed.into_iter().map(|(_, item)| item).collect();
    let summary = summarize(&results);
    tracing::debug!(
        total = summary.total,
        fetched = summary.fetched,
        cached = summary.cached,
        failed = summary.failed,
        "batch retrieval finished"
    );

    json_result(&OgpBatchRetrieveOutput { results, summary })
}

async fn batch_item(retriever: &Retriever, url: String) -> BatchItem {
    match retrieve_output(retriever, &url).await {
        Ok(output) => {
            let status_code = output.record.http_status();
            let (status, error) = if status_code == NETWORK_FAILURE_STATUS {
                (BatchItemStatus::Failed, Some("network failure".to_string()))
            } else if !output.record.is_success() {
                (BatchItemStatus::Failed, Some(format!("HTTP status {status_code}")))
            } else if output.cached {
                (BatchItemStatus::Cached, None)
            } else {
                (BatchItemStatus::Fetched, None)
            };
            BatchItem { url, status, result: Some(output), error }
        }
        Err(e) => BatchItem { url, status: BatchItemStatus::Failed, result: None, error: Some(e.to_string()) },
    }
}

fn summarize(results: &[BatchItem]) -> BatchSummary {
    let mut summary = BatchSummary { total: u32::try_from(results.len()).unwrap_or(u32::MAX), ..Default::default() };
    for item in results {
        match item.status {
            BatchItemStatus::Fetched => summary.fetched += 1,
            BatchItemStatus::Cached => summary.cached += 1,
            BatchItemStatus::Failed => summary.failed += 1,
        }
    }
    summary
}
