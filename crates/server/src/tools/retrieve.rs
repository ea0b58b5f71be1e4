//! ogp_retrieve tool implementation.
//!
//! Retrieves metadata for one URL through the cache-aware retriever.

use ogpinfo_client::{Retriever, Source};
use ogpinfo_core::{Error, Record, derive_key};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Input parameters for the ogp_retrieve tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OgpRetrieveParams {
    /// The URL to retrieve metadata for.
    pub url: String,
}

/// Output structure for the ogp_retrieve tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OgpRetrieveOutput {
    /// Cache file name the record is stored under.
    pub key: String,
    /// Whether the record came from a valid cache entry.
    pub cached: bool,
    /// Whether the record is on disk. False if the cache write failed.
    pub persisted: bool,
    /// Page title, preferring `og:title`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Page description, preferring `og:description`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Preview image, preferring `og:image`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// `og:site_name`, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    /// Site icon URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// The full record as cached.
    pub record: Record,
}

impl OgpRetrieveOutput {
    fn new(key: String, record: Record, cached: bool, persisted: bool) -> Self {
        Self {
            key,
            cached,
            persisted,
            title: record.title().map(str::to_string),
            description: record.description().map(str::to_string),
            image: record.image().map(str::to_string),
            site_name: record.site_name().map(str::to_string),
            icon: record.icon().map(str::to_string),
            record,
        }
    }
}

/// Retrieve one URL, recovering the record when only the cache write failed.
pub(crate) async fn retrieve_output(retriever: &Retriever, url: &str) -> Result<OgpRetrieveOutput, Error> {
    if url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()));
    }

    let key = derive_key(url);
    match retriever.retrieve_with_source(url).await {
        Ok((record, source)) => Ok(OgpRetrieveOutput::new(key, record, source == Source::Cache, true)),
        Err(Error::PersistFailed { record, .. }) => Ok(OgpRetrieveOutput::new(key, *record, false, false)),
        Err(err) => Err(err),
    }
}

/// Implementation of the ogp_retrieve tool.
pub async fn retrieve_impl(retriever: &Retriever, params: OgpRetrieveParams) -> Result<CallToolResult, McpError> {
    let output = retrieve_output(retriever, &params.url).await?;
    json_result(&output)
}
