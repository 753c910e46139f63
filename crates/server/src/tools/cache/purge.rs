//! cache_purge tool implementation.
//!
//! Deletes every entry of one cache family, or of all families.

use crate::error::ToolError;
use crate::tools::json_result;
use folio_core::{CacheFamily, CacheStore};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Family to purge: api_pages, posts, availability, local_sync or status.
    /// Omit to purge everything.
    #[serde(default)]
    pub family: Option<String>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
    /// Families that were purged.
    pub families: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(store: &CacheStore, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let families: Vec<CacheFamily> = match params.family.as_deref().map(str::trim) {
        None | Some("") => CacheFamily::ALL.to_vec(),
        Some(name) => vec![CacheFamily::parse(name).ok_or_else(|| {
            ToolError::InvalidInput(format!(
                "unknown cache family {name:?}, expected one of {}",
                CacheFamily::ALL.map(|f| f.as_str()).join(", ")
            ))
        })?],
    };

    let mut deleted = 0u64;
    for family in &families {
        deleted += store.purge_family(*family).await?;
    }
    tracing::info!(deleted, families = ?families, "cache purged");

    let output = CachePurgeOutput { deleted, families: families.iter().map(|f| f.as_str().to_string()).collect() };
    json_result(&output)
}
