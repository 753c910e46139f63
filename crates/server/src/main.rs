//! folio-sync server entry point.
//!
//! Loads configuration, opens the cache, warms it with the preloader and then
//! boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::{Context, Result};
use folio_client::{ContentSync, PreloadOutcome, Preloader};
use folio_core::{AppConfig, CacheDb, CacheStore};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        sources = config.sources.len(),
        mirror = config.mirror_url.is_some(),
        db_path = %config.db_path.display(),
        "starting folio-sync server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
    let store = Arc::new(CacheStore::new(Arc::new(db), config.cache_policy()?));
    let sync = Arc::new(ContentSync::from_config(&config, store)?);

    match Preloader::new(Arc::clone(&sync)).preload().await {
        PreloadOutcome::Deferred(_) => tracing::info!("serving from snapshot, refresh scheduled"),
        PreloadOutcome::Warmed { records, origin } => tracing::info!(records, ?origin, "cache warmed"),
    }

    let handler = handler::FolioServer::new(sync);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
