use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin, without the `/api` suffix.
    pub api_url: String,

    /// Where the session snapshot is persisted. `None` keeps it in memory.
    pub session_file: Option<PathBuf>,

    /// Request timeout. `None` keeps the HTTP stack's default.
    pub http_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".into(),
            session_file: None,
            http_timeout: None,
        }
    }
}

impl Config {
    pub fn from_env() -> ClientResult<Self> {
        dotenvy::dotenv().ok();

        let api_url = env::var("API_URL")
            .unwrap_or_else(|_| "http://localhost:8080".into())
            .trim_end_matches('/')
            .to_string();
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(ClientError::Config(format!(
                "API_URL must be an http(s) URL, got {}",
                api_url
            )));
        }

        let session_file = env::var("SESSION_FILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let http_timeout = match env::var("HTTP_TIMEOUT_SECS").ok().filter(|s| !s.is_empty()) {
            Some(raw) => Some(Duration::from_secs(raw.parse().map_err(|_| {
                ClientError::Config("HTTP_TIMEOUT_SECS must be a number".into())
            })?)),
            None => None,
        };

        Ok(Self {
            api_url,
            session_file,
            http_timeout,
        })
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Root of the REST API, e.g. `http://localhost:8080/api`.
    pub fn api_base(&self) -> String {
        format!("{}/api", self.api_url)
    }
}
