use std::sync::Arc;

use serde_json::Value;
use site_mcp::{FnToolHandler, McpError, ToolResult};

use super::{json_tool, str_arg, Deps};

/// Per-language listings and the resource prefix each one fetches.
pub const LOCALIZED_TOOLS: &[(&str, &str)] = &[
    ("list_pages", "pages"),
    ("list_posts", "posts"),
    ("list_series", "series"),
];

pub fn register(srv: &mut site_mcp::Server, deps: Arc<Deps>) {
    for &(name, resource) in LOCALIZED_TOOLS {
        let d = deps.clone();
        srv.handle_tool(name, FnToolHandler::new(move |args: Value| {
            let deps = d.clone();
            async move {
                let path = localized_path(resource, str_arg(&args, "language"));
                json_tool(&deps, &path).await
            }
        }));
    }

    let d = deps;
    srv.handle_tool("list_series_articles", FnToolHandler::new(move |args: Value| {
        let deps = d.clone();
        async move { handle_list_series_articles(&deps, args).await }
    }));
}

async fn handle_list_series_articles(deps: &Deps, args: Value) -> Result<ToolResult, McpError> {
    let language = str_arg(&args, "language");
    let series = str_arg(&args, "series");
    json_tool(deps, &series_articles_path(language, series)).await
}

pub fn localized_path(resource: &str, language: &str) -> String {
    format!("{}.{}.json", resource, language)
}

/// Turn a series URI into the slug of its article listing.
///
/// French URIs start with the `/fr/` locale prefix, every other language only
/// with `/`. The prefix is cut by length without checking its content, then
/// the remaining separators become hyphens: `/fr/series/nuxt` with `fr`
/// gives `series-nuxt.fr.json`.
pub fn series_articles_path(language: &str, series: &str) -> String {
    let prefix_len = if language == "fr" { 4 } else { 1 };
    let slug: String = series.chars().skip(prefix_len).collect();
    localized_path(&slug.replace('/', "-"), language)
}
