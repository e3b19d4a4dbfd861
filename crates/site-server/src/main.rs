mod config;
mod content;
mod tools;

use std::sync::Arc;

use config::{Config, Transport};
use content::{ContentApi, HttpContentClient};
use tools::Deps;

const SERVER_NAME: &str = "Estéban Soubiran personal website (soubiran.dev)";

fn build_server(deps: Arc<Deps>) -> site_mcp::Server {
    let mut srv = site_mcp::Server::builder()
        .tools_json(tools::TOOLS_JSON)
        .server_info(SERVER_NAME, env!("CARGO_PKG_VERSION"))
        .build();

    tools::register_all(&mut srv, deps);
    srv
}

/// JSON logs on stderr; stdout belongs to the stdio transport.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("install ctrl-c handler: {}", e);
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env()?;
    let client = HttpContentClient::new(&config.base_api_url, config.fetch_timeout)?;
    let deps = Arc::new(Deps {
        content: Arc::new(client) as Arc<dyn ContentApi>,
    });
    let srv = build_server(deps);

    {
        let missing = srv.unhandled_tools();
        if !missing.is_empty() {
            tracing::warn!(?missing, "declared tools without handlers");
        }
    }

    match config.transport {
        Transport::Stdio => {
            tracing::info!(base_api_url = %config.base_api_url, "serving MCP over stdio");
            site_mcp::serve_stdio(&srv).await?;
        }
        Transport::Http => {
            let addr = format!("0.0.0.0:{}", config.port);
            tracing::info!(addr = %addr, base_api_url = %config.base_api_url, "starting MCP server");

            let router = site_mcp::http_router(srv, config.site_url);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    Ok(())
}
