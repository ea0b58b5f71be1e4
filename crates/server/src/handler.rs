//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use ogpinfo_client::Retriever;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::tools::batch::{OgpBatchRetrieveParams, batch_impl};
use crate::tools::cache::{CacheGetParams, CacheSweepParams, get_impl, sweep_impl};
use crate::tools::retrieve::{OgpRetrieveParams, retrieve_impl};

/// The main MCP server handler for ogpinfo.
#[derive(Clone)]
pub struct OgpInfoServer {
    retriever: Arc<Retriever>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OgpInfoServer {
    /// Create a new server handler around a shared retriever.
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever, tool_router: Self::tool_router() }
    }

    /// Retrieve OGP, Twitter Card and Facebook metadata for one URL.
    #[tool(
        description = "Retrieve Open Graph, Twitter Card and Facebook metadata plus title, description and icon for a URL. Served from the on-disk cache while the entry is fresh."
    )]
    async fn ogp_retrieve(&self, params: Parameters<OgpRetrieveParams>) -> Result<CallToolResult, McpError> {
        retrieve_impl(&self.retriever, params.0).await
    }

    /// Retrieve metadata for several URLs with bounded concurrency.
    #[tool(
        description = "Retrieve page metadata for multiple URLs in parallel (default concurrency 4, max 16). Results are returned in input order with a summary."
    )]
    async fn ogp_batch_retrieve(&self, params: Parameters<OgpBatchRetrieveParams>) -> Result<CallToolResult, McpError> {
        batch_impl(&self.retriever, params.0).await
    }

    /// Look up a cached record without fetching.
    #[tool(description = "Return the cached metadata record for a URL without fetching. Fails with CACHE_MISS if absent or expired.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.retriever, params.0).await
    }

    /// Sweep expired cache entries.
    #[tool(description = "Delete expired and corrupt cache entries. Optionally drop every entry for one host.")]
    async fn cache_sweep(&self, params: Parameters<CacheSweepParams>) -> Result<CallToolResult, McpError> {
        sweep_impl(&self.retriever, params.0).await
    }
}

impl ServerHandler for OgpInfoServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "ogpinfo-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
