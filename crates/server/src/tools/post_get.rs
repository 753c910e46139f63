//! post_get tool implementation.

use super::json_result;
use folio_client::ContentSync;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for post_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostGetParams {
    /// URL slug of the post.
    pub slug: String,
}

/// Look up a single sanitized post by slug. Fails with NOT_FOUND when no
/// tier has it.
pub async fn get_impl(sync: &ContentSync, params: PostGetParams) -> Result<CallToolResult, McpError> {
    let post = sync.get_post_by_slug(&params.slug).await?;
    json_result(&post)
}
