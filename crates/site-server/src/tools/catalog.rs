use std::sync::Arc;

use serde_json::Value;
use site_mcp::FnToolHandler;

use super::{json_tool, Deps};

/// Parameterless tools and the document each one proxies.
pub const STATIC_TOOLS: &[(&str, &str)] = &[
    ("list_languages", "languages.json"),
    ("list_parts", "parts.json"),
    ("list_projects", "projects.json"),
    ("list_talks", "talks.json"),
    ("list_socials", "socials.json"),
];

pub fn register(srv: &mut site_mcp::Server, deps: Arc<Deps>) {
    for &(name, path) in STATIC_TOOLS {
        let d = deps.clone();
        srv.handle_tool(name, FnToolHandler::new(move |_args: Value| {
            let deps = d.clone();
            async move { json_tool(&deps, path).await }
        }));
    }
}
