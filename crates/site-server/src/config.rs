use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_API_URL: &str = "https://soubiran.dev/api/mcp";
pub const DEFAULT_SITE_URL: &str = "https://soubiran.dev";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// How the server talks to MCP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Streamable HTTP and legacy SSE on one listener.
    Http,
    /// Newline-delimited JSON-RPC on stdin/stdout.
    Stdio,
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Transport::Http),
            "stdio" => Ok(Transport::Stdio),
            other => Err(format!("unknown transport \"{}\" (expected http or stdio)", other)),
        }
    }
}

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the upstream content API.
    pub base_api_url: String,
    /// Where browsers hitting the MCP endpoint are redirected.
    pub site_url: String,
    pub transport: Transport,
    pub port: u16,
    /// Upstream request timeout; `None` keeps the client default.
    pub fetch_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_api_url = get("BASE_API_URL").unwrap_or_else(|| DEFAULT_BASE_API_URL.into());
        if !(base_api_url.starts_with("http://") || base_api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "BASE_API_URL",
                reason: format!("\"{}\" is not an http(s) URL", base_api_url),
            });
        }

        let transport = match get("MCP_TRANSPORT") {
            Some(v) => v.parse().map_err(|reason| ConfigError::Invalid {
                var: "MCP_TRANSPORT",
                reason,
            })?,
            None => Transport::Http,
        };

        let port = match get("PORT") {
            Some(v) => v.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "PORT",
                reason: format!("\"{}\": {}", v, e),
            })?,
            None => DEFAULT_PORT,
        };

        let fetch_timeout = match get("FETCH_TIMEOUT_SECS") {
            Some(v) => Some(Duration::from_secs(v.trim().parse().map_err(|e| {
                ConfigError::Invalid {
                    var: "FETCH_TIMEOUT_SECS",
                    reason: format!("\"{}\": {}", v, e),
                }
            })?)),
            None => None,
        };

        Ok(Config {
            base_api_url,
            site_url: get("SITE_URL").unwrap_or_else(|| DEFAULT_SITE_URL.into()),
            transport,
            port,
            fetch_timeout,
        })
    }
}
