//! `site-mcp` — Model Context Protocol handler and transports for the
//! personal-site content server.
//!
//! Implements the MCP 2025-03-26 specification (and accepts 2024-11-05
//! clients) as a protocol handler. Tool definitions are declared in JSON,
//! async handlers are registered by name, and the resulting [`Server`] is
//! served over Streamable HTTP, the legacy SSE transport, or stdio.
//!
//! # Quick start
//!
//! ```rust
//! use site_mcp::{Server, FnToolHandler, text_result, Dispatch};
//! use serde_json::Value;
//!
//! # async fn example() {
//! let mut server = Server::builder()
//!     .tools_json(r#"[{"name":"list_talks","description":"talks","inputSchema":{"type":"object","properties":{}}}]"#.as_bytes())
//!     .server_info("my-site", "1.0.0")
//!     .build();
//!
//! server.handle_tool("list_talks", FnToolHandler::new(|_args: Value| async move {
//!     Ok(text_result("[]"))
//! }));
//!
//! let out = server.dispatch(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await;
//! assert_eq!(out, Dispatch::Reply(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#.into()));
//! # }
//! ```

pub mod loader;
pub mod server;
pub mod transport_http;
pub mod transport_stdio;
pub mod types;
mod validate;

pub use loader::parse_tools;
pub use server::{Dispatch, FnToolHandler, Server, ServerBuilder, ToolHandler};
pub use transport_http::http_router;
pub use transport_stdio::{serve_io, serve_stdio};
pub use types::{
    error_result, text_result, ContentBlock, JsonRpcRequest, JsonRpcResponse,
    McpError, McpResponse, RpcError, Tool, ToolResult, PROTOCOL_VERSION,
};
