//! cache_get tool implementation.
//!
//! Returns the cached record for a URL without fetching.

use ogpinfo_client::Retriever;
use ogpinfo_core::{Error, Record, derive_key};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// The URL whose cached record to return.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// Cache file name the record is stored under.
    pub key: String,
    /// The cached record.
    pub record: Record,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(retriever: &Retriever, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let record = retriever
        .cached(&params.url)
        .await
        .ok_or_else(|| Error::CacheMiss(params.url.clone()))?;

    json_result(&CacheGetOutput { key: derive_key(&params.url), record })
}
