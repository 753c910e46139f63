//! posts_list tool implementation.
//!
//! Lists one page of sanitized posts through the full tier cascade.

use super::json_result;
use crate::error::ToolError;
use folio_client::{ContentSync, Origin, PageQuery};
use folio_core::Post;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for posts_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PostsListParams {
    /// 1-based page number (default: 1).
    #[serde(default)]
    pub page: Option<u32>,

    /// Posts per page, 1-100 (default: configured page size).
    #[serde(default)]
    pub per_page: Option<u32>,

    /// Only posts in this category id.
    #[serde(default)]
    pub category: Option<i64>,

    /// Only posts with this tag id.
    #[serde(default)]
    pub tag: Option<i64>,

    /// Free-text search passed to the source.
    #[serde(default)]
    pub search: Option<String>,

    /// Skip the cache and the availability short-circuit.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Output structure for posts_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostsListOutput {
    pub posts: Vec<Post>,
    pub page: u32,
    pub total_pages: u64,
    pub total: u64,
    /// Tier that produced the page: source, cache, snapshot, mirror or empty.
    pub origin: String,
    /// True when served from the snapshot or the mirror.
    pub degraded: bool,
}

fn origin_label(origin: Origin) -> String {
    serde_json::to_value(origin).ok().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default()
}

fn build_query(sync: &ContentSync, params: PostsListParams) -> Result<PageQuery, ToolError> {
    let page = params.page.unwrap_or(1);
    if page == 0 {
        return Err(ToolError::InvalidInput("page must be at least 1".into()));
    }
    let per_page = params.per_page.unwrap_or(sync.options().default_per_page);
    if !(1..=100).contains(&per_page) {
        return Err(ToolError::InvalidInput("per_page must be between 1 and 100".into()));
    }

    let mut query = PageQuery::new(page, per_page);
    query.category = params.category;
    query.tag = params.tag;
    query.search = params.search;
    query.bypass_cache = params.force_refresh;
    Ok(query)
}

/// Implementation of the posts_list tool.
pub async fn list_impl(sync: &ContentSync, params: PostsListParams) -> Result<CallToolResult, McpError> {
    let query = build_query(sync, params)?;
    let page = sync.list_posts(&query).await;

    let output = PostsListOutput {
        degraded: matches!(page.origin, Origin::Snapshot | Origin::Mirror),
        origin: origin_label(page.origin),
        page: query.page,
        total_pages: page.total_pages,
        total: page.total,
        posts: page.posts,
    };
    json_result(&output)
}
