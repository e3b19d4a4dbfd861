use std::sync::Arc;

use serde_json::Value;
use site_mcp::{text_result, FnToolHandler, McpError, ToolResult};

use super::{fetch_failed, str_arg, Deps};

pub fn register(srv: &mut site_mcp::Server, deps: Arc<Deps>) {
    let d = deps;
    srv.handle_tool("get_page", FnToolHandler::new(move |args: Value| {
        let deps = d.clone();
        async move { handle_get_page(&deps, args).await }
    }));
}

async fn handle_get_page(deps: &Deps, args: Value) -> Result<ToolResult, McpError> {
    let path = page_path(str_arg(&args, "url"));
    tracing::debug!(tool = "get_page", path = %path, "fetch markdown");

    let markdown = deps
        .content
        .fetch_text(&path)
        .await
        .map_err(|e| fetch_failed(&path, e))?;

    // Sent as a JSON string literal, the same encoding as the listings.
    Ok(text_result(serde_json::to_string(&markdown)?))
}

/// Map a site URL to its markdown document. Locale roots point at their
/// index page.
pub fn page_path(url: &str) -> String {
    let url = match url {
        "/" => "/index",
        "/fr/" => "/fr/index",
        other => other,
    };
    format!("pages{}.md", url)
}
