use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("GET {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("GET {url}: {status}")]
    Status { url: String, status: StatusCode },
    #[error("decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read access to the site's content API. Paths are relative to its base URL.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn fetch_json(&self, path: &str) -> Result<Value, ContentError>;
    async fn fetch_text(&self, path: &str) -> Result<String, ContentError>;
}

/// Join a relative resource path onto the API base with exactly one slash
/// between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Content API client over HTTP.
pub struct HttpContentClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ContentError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build().map_err(ContentError::Client)?,
            base_url: base_url.into(),
        })
    }

    async fn get(&self, path: &str, accept: &str) -> Result<(String, String), ContentError> {
        let url = join_url(&self.base_url, path);

        let resp = self
            .client
            .get(&url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|source| ContentError::Request {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ContentError::Status { url, status });
        }

        let body = resp.text().await.map_err(|source| ContentError::Request {
            url: url.clone(),
            source,
        })?;

        Ok((url, body))
    }
}

#[async_trait]
impl ContentApi for HttpContentClient {
    async fn fetch_json(&self, path: &str) -> Result<Value, ContentError> {
        let (url, body) = self.get(path, "application/json").await?;
        serde_json::from_str(&body).map_err(|source| ContentError::Decode { url, source })
    }

    async fn fetch_text(&self, path: &str) -> Result<String, ContentError> {
        let (_, body) = self.get(path, "text/markdown, text/plain;q=0.9, */*;q=0.8").await?;
        Ok(body)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    /// Serve a tiny upstream API on an ephemeral port and return its base URL.
    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route(
                "/api/mcp/languages.json",
                get(|| async { Json(json!([{"code": "en", "name": "English"}])) }),
            )
            .route("/api/mcp/pages/about.md", get(|| async { "# About\n\nHello." }))
            .route("/api/mcp/broken.json", get(|| async { "<html>oops</html>" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/mcp", addr)
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.dev/api", "x.json"), "https://a.dev/api/x.json");
        assert_eq!(join_url("https://a.dev/api/", "x.json"), "https://a.dev/api/x.json");
        assert_eq!(join_url("https://a.dev/api/", "/x.json"), "https://a.dev/api/x.json");
        assert_eq!(
            join_url("https://a.dev/api", "pages/fr/index.md"),
            "https://a.dev/api/pages/fr/index.md"
        );
    }

    #[tokio::test]
    async fn test_fetch_json() {
        let base = spawn_upstream().await;
        let client = HttpContentClient::new(base, None).unwrap();
        let value = client.fetch_json("languages.json").await.unwrap();
        assert_eq!(value, json!([{"code": "en", "name": "English"}]));
    }

    #[tokio::test]
    async fn test_fetch_text_with_trailing_slash_base() {
        let base = spawn_upstream().await;
        let client = HttpContentClient::new(format!("{}/", base), Some(Duration::from_secs(5))).unwrap();
        let text = client.fetch_text("pages/about.md").await.unwrap();
        assert_eq!(text, "# About\n\nHello.");
    }

    #[tokio::test]
    async fn test_missing_resource_is_status_error() {
        let base = spawn_upstream().await;
        let client = HttpContentClient::new(base, None).unwrap();
        let err = client.fetch_json("nope.json").await.unwrap_err();
        match err {
            ContentError::Status { url, status } => {
                assert!(url.ends_with("/api/mcp/nope.json"));
                assert_eq!(status, StatusCode::NOT_FOUND);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_error() {
        let base = spawn_upstream().await;
        let client = HttpContentClient::new(base, None).unwrap();
        let err = client.fetch_json("broken.json").await.unwrap_err();
        assert!(matches!(err, ContentError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_request_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpContentClient::new(format!("http://{}", addr), None).unwrap();
        let err = client.fetch_json("languages.json").await.unwrap_err();
        assert!(matches!(err, ContentError::Request { .. }));
    }
}
