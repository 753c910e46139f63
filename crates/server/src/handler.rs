//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::{
    CachePurgeParams, PostGetParams, PostsListParams, get_impl, list_impl, purge_impl, status_impl,
};
use folio_client::ContentSync;
use std::sync::Arc;

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

/// The main MCP server handler for folio-sync.
#[derive(Clone)]
pub struct FolioServer {
    sync: Arc<ContentSync>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl FolioServer {
    /// Create a new server handler over a shared sync layer.
    pub fn new(sync: Arc<ContentSync>) -> Self {
        Self { sync, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "List published posts, newest first. Falls back to the local snapshot or the origin mirror when every source is down; `degraded` marks such pages."
    )]
    async fn posts_list(&self, params: Parameters<PostsListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.sync, params.0).await
    }

    #[tool(description = "Get one sanitized post by slug. Returns NOT_FOUND when no source, snapshot or mirror has it.")]
    async fn post_get(&self, params: Parameters<PostGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.sync, params.0).await
    }

    #[tool(description = "Report source availability, the last fetch outcome, snapshot size and cache entry counts.")]
    async fn sync_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.sync).await
    }

    #[tool(description = "Delete cached entries for one family (api_pages, posts, availability, local_sync, status) or all.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(self.sync.store(), params.0).await
    }
}

impl ServerHandler for FolioServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "folio-sync".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::offline_sync;

    #[tokio::test]
    async fn test_router_lists_all_tools() {
        let server = FolioServer::new(offline_sync().await);
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["cache_purge", "post_get", "posts_list", "sync_status"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = FolioServer::new(offline_sync().await);
        let info = server.get_info();
        assert_eq!(info.server_info.name, "folio-sync");
        assert!(info.capabilities.tools.is_some());
    }
}
