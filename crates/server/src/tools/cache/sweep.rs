//! cache_sweep tool implementation.
//!
//! Deletes expired cache entries, and optionally every entry for one host.

use ogpinfo_client::Retriever;
use ogpinfo_core::{Error, SweepReport};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_sweep tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheSweepParams {
    /// Also drop every entry cached for this host, fresh or not.
    #[serde(default)]
    pub host: Option<String>,
}

/// Output from the cache_sweep tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheSweepOutput {
    /// Result of the expiry sweep.
    pub report: SweepReport,
    /// Entries dropped for `host`, if one was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_purged: Option<u64>,
}

/// Implementation of the cache_sweep tool.
pub async fn sweep_impl(retriever: &Retriever, params: CacheSweepParams) -> Result<CallToolResult, McpError> {
    if let Some(host) = &params.host
        && host.trim().is_empty()
    {
        return Err(Error::InvalidInput("host cannot be empty".into()).into());
    }

    let report = retriever.clear_cache().await?;

    let host_purged = match &params.host {
        Some(host) => Some(retriever.purge_host(host.trim()).await?),
        None => None,
    };

    json_result(&CacheSweepOutput { report, host_purged })
}
