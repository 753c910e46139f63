//! MCP tool implementations.
//!
//! This module contains all tools exposed by the folio-sync server. Every tool
//! answers with a single JSON text content block.

pub mod cache;
pub mod post_get;
pub mod posts_list;
pub mod sync_status;

pub use cache::{CachePurgeParams, purge_impl};
pub use post_get::{PostGetParams, get_impl};
pub use posts_list::{PostsListParams, list_impl};
pub use sync_status::status_impl;

use crate::error::ToolError;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::OutputFailed(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
