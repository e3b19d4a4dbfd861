use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::{json, Value};

use crate::loader;
use crate::types::*;

/// Handler trait for MCP tools. Implement this or use closures.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<ToolResult, McpError>;
}

/// Wraps an async closure into a ToolHandler.
pub struct FnToolHandler<F> {
    f: F,
}

impl<F, Fut> FnToolHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<ToolResult, McpError>> + Send + 'static,
{
    pub fn new(f: F) -> Arc<dyn ToolHandler> {
        Arc::new(Self { f })
    }
}

#[async_trait]
impl<F, Fut> ToolHandler for FnToolHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<ToolResult, McpError>> + Send + 'static,
{
    async fn call(&self, args: Value) -> Result<ToolResult, McpError> {
        (self.f)(args).await
    }
}

/// Outcome of processing one raw JSON-RPC payload.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Only notifications were received; nothing to send back.
    Accepted,
    /// Serialized response: a single object, or an array for batches.
    Reply(String),
    /// The payload was not valid JSON-RPC; serialized error response.
    Rejected(String),
}

/// The MCP server. Create with `ServerBuilder`, register handlers, then serve.
pub struct Server {
    server_name: String,
    server_version: String,
    tools: HashMap<String, Tool>,
    tool_handlers: HashMap<String, Arc<dyn ToolHandler>>,
    /// Pre-serialized `tools/list` result.
    tools_list: Option<Arc<RawValue>>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Register a tool handler.
    pub fn handle_tool(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.tool_handlers.insert(name.into(), handler);
    }

    /// Names of the declared tools that have no registered handler.
    pub fn unhandled_tools(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tools
            .keys()
            .filter(|name| !self.tool_handlers.contains_key(*name))
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    /// Process a raw JSON-RPC payload, either a single message or a batch.
    pub async fn dispatch(&self, body: &[u8]) -> Dispatch {
        let payload: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                let resp = McpResponse::error(None, ERR_CODE_PARSE, format!("parse error: {}", e));
                return Dispatch::Rejected(encode(&resp));
            }
        };

        match payload {
            Value::Array(items) if items.is_empty() => {
                let resp = McpResponse::error(None, ERR_CODE_INVALID_REQ, "empty batch");
                Dispatch::Rejected(encode(&resp))
            }
            Value::Array(items) => {
                let mut replies = Vec::with_capacity(items.len());
                for item in items {
                    let resp = self.handle_value(item).await;
                    if !resp.is_notification() {
                        replies.push(resp);
                    }
                }
                if replies.is_empty() {
                    Dispatch::Accepted
                } else {
                    Dispatch::Reply(encode(&replies))
                }
            }
            single => {
                let resp = self.handle_value(single).await;
                if resp.is_notification() {
                    Dispatch::Accepted
                } else {
                    Dispatch::Reply(encode(&resp))
                }
            }
        }
    }

    async fn handle_value(&self, value: Value) -> McpResponse {
        let id = value.get("id").cloned();
        // An explicit null id is neither a request nor a notification.
        if id.as_ref().is_some_and(Value::is_null) {
            return McpResponse::error(
                None,
                ERR_CODE_INVALID_REQ,
                "invalid request: id must not be null",
            );
        }
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(req) => self.handle(req).await,
            Err(e) => McpResponse::error(id, ERR_CODE_INVALID_REQ, format!("invalid request: {}", e)),
        }
    }

    /// Route a JSON-RPC request to the appropriate MCP handler.
    pub async fn handle(&self, req: JsonRpcRequest) -> McpResponse {
        if req.jsonrpc != "2.0" {
            return McpResponse::error(req.id, ERR_CODE_INVALID_REQ, "jsonrpc must be '2.0'");
        }

        // Messages without an id never get a response.
        if req.id.is_none() {
            tracing::debug!(method = %req.method, "notification");
            return McpResponse::notification();
        }

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => McpResponse::ok(req.id, json!({})),
            "tools/list" => match &self.tools_list {
                Some(raw) => McpResponse::cached(req.id, raw),
                None => McpResponse::error(req.id, ERR_CODE_INTERNAL, "tools list unavailable"),
            },
            "tools/call" => self.handle_tools_call(req).await,
            _ => McpResponse::error(
                req.id,
                ERR_CODE_NO_METHOD,
                format!("Method not found: {}", req.method),
            ),
        }
    }

    fn handle_initialize(&self, req: JsonRpcRequest) -> McpResponse {
        let params = req
            .params
            .as_ref()
            .and_then(|p| serde_json::from_value::<InitializeParams>(p.clone()).ok());

        let requested = params.as_ref().and_then(|p| p.protocol_version.as_deref());
        if let Some(p) = &params {
            let client_name = p.client_info.as_ref().map_or("", |c| c.name.as_str());
            let client_version = p.client_info.as_ref().map_or("", |c| c.version.as_str());
            tracing::info!(
                client_name,
                client_version,
                protocol_version = ?requested,
                "initialize"
            );
        }

        let result = json!({
            "protocolVersion": negotiate_version(requested),
            "capabilities": {
                "tools": {"listChanged": false},
            },
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version,
            },
        });

        McpResponse::ok(req.id, result)
    }

    async fn handle_tools_call(&self, req: JsonRpcRequest) -> McpResponse {
        let params: ToolCallParams = match req.params.as_ref() {
            Some(p) => match serde_json::from_value(p.clone()) {
                Ok(p) => p,
                Err(e) => {
                    return McpResponse::error(
                        req.id,
                        ERR_CODE_BAD_PARAMS,
                        format!("invalid params: {}", e),
                    );
                }
            },
            None => return McpResponse::error(req.id, ERR_CODE_BAD_PARAMS, "params required"),
        };

        let args = if params.arguments.is_null() {
            json!({})
        } else {
            params.arguments
        };

        let Some(tool) = self.tools.get(&params.name) else {
            return McpResponse::error(
                req.id,
                ERR_CODE_NO_METHOD,
                format!("Unknown tool: {}", params.name),
            );
        };

        if let Err(e) = tool.validate_arguments(&args) {
            tracing::debug!(tool = %params.name, error = %e, "rejected tool arguments");
            return McpResponse::error(req.id, ERR_CODE_BAD_PARAMS, e.to_string());
        }

        let Some(handler) = self.tool_handlers.get(&params.name) else {
            return McpResponse::error(
                req.id,
                ERR_CODE_INTERNAL,
                format!("no handler for tool: {}", params.name),
            );
        };

        let result = match handler.call(args).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(tool = %params.name, error = %e, "tool call failed");
                error_result(e.to_string())
            }
        };

        match serde_json::to_value(&result) {
            Ok(value) => McpResponse::ok(req.id, value),
            Err(e) => McpResponse::error(req.id, ERR_CODE_INTERNAL, format!("encode result: {}", e)),
        }
    }
}

/// Pick the protocol version to answer `initialize` with.
fn negotiate_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().copied().find(|s| *s == v))
        .unwrap_or(PROTOCOL_VERSION)
}

fn encode<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "encode response");
        format!(
            r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{},"message":"internal error"}}}}"#,
            ERR_CODE_INTERNAL
        )
    })
}

/// Builder for constructing an MCP Server.
#[derive(Default)]
pub struct ServerBuilder {
    tools: Vec<Tool>,
    server_name: Option<String>,
    server_version: Option<String>,
}

impl ServerBuilder {
    /// Add tool definitions directly.
    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Parse tool definitions from raw JSON bytes.
    pub fn tools_json(mut self, data: &[u8]) -> Self {
        match loader::parse_tools(data) {
            Ok(tools) => self.tools.extend(tools),
            Err(e) => tracing::error!("parse tools json: {}", e),
        }
        self
    }

    /// Set server name and version.
    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self.server_version = Some(version.into());
        self
    }

    /// Build the server.
    pub fn build(self) -> Server {
        let tools_list = match serde_json::value::to_raw_value(&json!({ "tools": self.tools })) {
            Ok(raw) => Some(Arc::from(raw)),
            Err(e) => {
                tracing::error!("encode tools list: {}", e);
                None
            }
        };

        Server {
            server_name: self.server_name.unwrap_or_else(|| "site-mcp".into()),
            server_version: self.server_version.unwrap_or_else(|| "1.0.0".into()),
            tools: self.tools.into_iter().map(|t| (t.name.clone(), t)).collect(),
            tool_handlers: HashMap::new(),
            tools_list,
        }
    }
}
