pub mod catalog;
pub mod localized;
pub mod pages;

use std::sync::Arc;

use serde_json::Value;
use site_mcp::{text_result, McpError, ToolResult};

use crate::content::{ContentApi, ContentError};

/// Declarations (name, description, input schema) of every site tool.
pub const TOOLS_JSON: &[u8] = include_bytes!("../../tools.json");

/// Shared dependencies for all tool handlers.
pub struct Deps {
    pub content: Arc<dyn ContentApi>,
}

/// Register all tool handlers on the given MCP server.
pub fn register_all(srv: &mut site_mcp::Server, deps: Arc<Deps>) {
    catalog::register(srv, deps.clone());
    localized::register(srv, deps.clone());
    pages::register(srv, deps);
}

/// Fetch a JSON document and return it re-serialized as a text result.
pub(crate) async fn json_tool(deps: &Deps, path: &str) -> Result<ToolResult, McpError> {
    tracing::debug!(path, "fetch json");

    let value = deps
        .content
        .fetch_json(path)
        .await
        .map_err(|e| fetch_failed(path, e))?;

    Ok(text_result(serde_json::to_string(&value)?))
}

pub(crate) fn fetch_failed(path: &str, err: ContentError) -> McpError {
    tracing::error!(path, error = %err, "content fetch failed");
    McpError::Tool(format!("failed to fetch {}: {}", path, err))
}

/// String argument by name. Presence and type are checked by the server
/// against the tool's schema before any handler runs.
pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(|v| v.as_str()).unwrap_or("")
}
