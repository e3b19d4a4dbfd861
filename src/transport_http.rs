use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, KeepAliveStream, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::server::{Dispatch, Server};

const SESSION_HEADER: &str = "mcp-session-id";
const SSE_MESSAGE_PATH: &str = "/sse/message";

/// Shared state for the HTTP handlers.
struct HttpState {
    server: Server,
    redirect_url: String,
    /// Open legacy SSE streams, keyed by session id.
    sse_sessions: Mutex<HashMap<String, UnboundedSender<String>>>,
}

impl HttpState {
    fn new(server: Server, redirect_url: String) -> Arc<Self> {
        Arc::new(HttpState {
            server,
            redirect_url,
            sse_sessions: Mutex::new(HashMap::new()),
        })
    }

    // Never held across an await.
    fn sessions(&self) -> MutexGuard<'_, HashMap<String, UnboundedSender<String>>> {
        self.sse_sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create an Axum router for the MCP server.
///
/// Streamable HTTP is served on `/` and `/mcp`, the legacy SSE transport on
/// `/sse`. Browsers (and every unknown path) are sent to `redirect_url`.
pub fn http_router(server: Server, redirect_url: impl Into<String>) -> Router {
    router(HttpState::new(server, redirect_url.into()))
}

fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", post(handle_mcp).get(handle_mcp_get))
        .route("/mcp", post(handle_mcp).get(handle_mcp_get))
        .route("/sse", get(handle_sse))
        .route(SSE_MESSAGE_PATH, post(handle_sse_message))
        .route("/healthz", get(handle_healthz))
        .fallback(handle_fallback)
        .with_state(state)
}

async fn handle_healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn handle_fallback(State(state): State<Arc<HttpState>>) -> Response {
    redirect(&state.redirect_url)
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn json_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn handle_mcp_get(State(state): State<Arc<HttpState>>, headers: HeaderMap) -> Response {
    if wants_html(&headers) {
        return redirect(&state.redirect_url);
    }
    // Stateless server: no standalone server-to-client stream.
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

async fn handle_mcp(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if wants_html(&headers) {
        return redirect(&state.redirect_url);
    }

    // A new session id on initialize; otherwise echo the client's.
    let session_id = if is_initialize(&body) {
        Some(Uuid::new_v4().to_string())
    } else {
        headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };

    let mut response = match state.server.dispatch(&body).await {
        Dispatch::Accepted => (StatusCode::ACCEPTED, Body::empty()).into_response(),
        Dispatch::Reply(json) => json_response(StatusCode::OK, json),
        Dispatch::Rejected(json) => json_response(StatusCode::BAD_REQUEST, json),
    };

    if let Some(value) = session_id.and_then(|sid| HeaderValue::from_str(&sid).ok()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }

    response
}

fn is_initialize(body: &[u8]) -> bool {
    #[derive(Deserialize)]
    struct MethodOnly {
        method: String,
    }
    serde_json::from_slice::<MethodOnly>(body).is_ok_and(|m| m.method == "initialize")
}

/// Event stream of one legacy SSE session. Dropping it (the client went
/// away) unregisters the session.
struct SessionStream {
    inner: BoxStream<'static, Result<Event, Infallible>>,
    state: Arc<HttpState>,
    session_id: String,
}

impl Stream for SessionStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.state.sessions().remove(&self.session_id);
        tracing::info!(session_id = %self.session_id, "sse session closed");
    }
}

async fn handle_sse(State(state): State<Arc<HttpState>>) -> Sse<KeepAliveStream<SessionStream>> {
    let session_id = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded::<String>();
    state.sessions().insert(session_id.clone(), tx);

    tracing::info!(session_id = %session_id, "sse session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{}?sessionId={}", SSE_MESSAGE_PATH, session_id));
    let messages = rx.map(|json| Ok(Event::default().event("message").data(json)));

    let stream = SessionStream {
        inner: stream::once(async move { Ok(endpoint) }).chain(messages).boxed(),
        state,
        session_id,
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

async fn handle_sse_message(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Response {
    let tx = state.sessions().get(&query.session_id).cloned();
    let Some(tx) = tx else {
        return (StatusCode::NOT_FOUND, "session not found").into_response();
    };

    let json = match state.server.dispatch(&body).await {
        Dispatch::Accepted => return (StatusCode::ACCEPTED, "Accepted").into_response(),
        Dispatch::Rejected(json) => return json_response(StatusCode::BAD_REQUEST, json),
        Dispatch::Reply(json) => json,
    };

    if tx.unbounded_send(json).is_err() {
        // The event stream went away while this message was in flight.
        state.sessions().remove(&query.session_id);
        return (StatusCode::GONE, "session closed").into_response();
    }

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{FnToolHandler, Server};
    use crate::types::text_result;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    const SITE: &str = "https://example.com";

    fn test_server() -> Server {
        let mut srv = Server::builder()
            .tools_json(
                r#"[{"name":"echo","description":"test","inputSchema":{"type":"object","properties":{}}}]"#.as_bytes(),
            )
            .server_info("test", "0.1")
            .build();
        srv.handle_tool(
            "echo",
            FnToolHandler::new(|_args: Value| async move { Ok(text_result("pong")) }),
        );
        srv
    }

    fn test_router() -> Router {
        http_router(test_server(), SITE)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let req = Request::builder()
            .method("GET")
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_initialize_returns_session_id() {
        let body = json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2025-03-26", "capabilities": {}, "clientInfo": {"name": "test", "version": "0.1"}}
        });
        let resp = test_router().oneshot(post_json("/mcp", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(SESSION_HEADER));
    }

    #[tokio::test]
    async fn test_session_id_is_echoed() {
        let mut req = post_json("/mcp", json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
        req.headers_mut()
            .insert(SESSION_HEADER, HeaderValue::from_static("abc"));
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.headers()[SESSION_HEADER], "abc");
    }

    #[tokio::test]
    async fn test_notification_returns_202() {
        let body = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        let resp = test_router().oneshot(post_json("/mcp", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_tools_call_on_root_path() {
        let body = json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "echo"}});
        let resp = test_router().oneshot(post_json("/", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let v = body_json(resp).await;
        assert_eq!(v["id"], 3);
        assert_eq!(v["result"]["content"][0]["text"], "pong");
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let req = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from("{bad json"))
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let req = Request::builder()
            .method("GET")
            .uri("/mcp")
            .body(Body::empty())
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_browser_is_redirected() {
        let req = Request::builder()
            .method("GET")
            .uri("/")
            .header("accept", "text/html,application/xhtml+xml")
            .body(Body::empty())
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], SITE);
    }

    #[tokio::test]
    async fn test_unknown_path_is_redirected() {
        let req = Request::builder()
            .method("GET")
            .uri("/favicon.ico")
            .body(Body::empty())
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], SITE);
    }

    #[tokio::test]
    async fn test_browser_post_is_redirected() {
        let mut req = post_json("/mcp", json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
        req.headers_mut()
            .insert(header::ACCEPT, HeaderValue::from_static("text/html"));
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], SITE);
    }

    #[tokio::test]
    async fn test_dropped_sse_streams_are_unregistered() {
        let state = HttpState::new(test_server(), SITE.into());

        for _ in 0..3 {
            let sse = handle_sse(State(state.clone())).await;
            assert_eq!(state.sessions().len(), 1);
            drop(sse);
        }

        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_sse_disconnect_through_router() {
        let state = HttpState::new(test_server(), SITE.into());
        let req = Request::builder()
            .method("GET")
            .uri("/sse")
            .body(Body::empty())
            .unwrap();

        let resp = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(state.sessions().len(), 1);

        drop(resp);
        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_sse_message_to_closed_stream() {
        let state = HttpState::new(test_server(), SITE.into());
        let (tx, rx) = mpsc::unbounded::<String>();
        drop(rx);
        state.sessions().insert("closed".into(), tx);

        let body = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
        let resp = router(state.clone())
            .oneshot(post_json("/sse/message?sessionId=closed", body))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::GONE);
        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_sse_message_unknown_session() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
        let resp = test_router()
            .oneshot(post_json("/sse/message?sessionId=missing", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sse_session_round_trip() {
        let app = test_router();

        let req = Request::builder()
            .method("GET")
            .uri("/sse")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");

        let mut body = resp.into_body();
        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.starts_with("event: endpoint\n"));
        let endpoint = first
            .lines()
            .find_map(|l| l.strip_prefix("data: "))
            .unwrap()
            .to_string();
        assert!(endpoint.starts_with("/sse/message?sessionId="));

        let ping = json!({"jsonrpc": "2.0", "id": 42, "method": "ping"});
        let resp = app.oneshot(post_json(&endpoint, ping)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let next = body.frame().await.unwrap().unwrap().into_data().unwrap();
        let next = String::from_utf8(next.to_vec()).unwrap();
        assert!(next.starts_with("event: message\n"));
        let data = next.lines().find_map(|l| l.strip_prefix("data: ")).unwrap();
        let v: Value = serde_json::from_str(data).unwrap();
        assert_eq!(v["id"], 42);
        assert_eq!(v["result"], json!({}));
    }
}
