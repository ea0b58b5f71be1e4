//! ogpinfo-mcp server entry point.
//!
//! Boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use ogpinfo_client::Retriever;
use ogpinfo_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        cache_dir = %config.cache_dir.display(),
        ttl_secs = config.cache_ttl_secs,
        "Starting ogpinfo-mcp server on stdio transport"
    );

    let retriever = Arc::new(Retriever::from_config(&config)?);
    let handler = handler::OgpInfoServer::new(retriever);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
