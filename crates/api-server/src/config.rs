use anyhow::Context;
use std::time::Duration;

/// Server settings loaded from the environment (and `.env` via dotenvy)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub polygon_api_key: String,
    /// Polygon requests per minute
    pub polygon_rate_limit: usize,
    /// Background detection interval; `None` disables the poller
    pub poll_interval: Option<Duration>,
    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
    /// Upper bound on cached company names
    pub name_cache_capacity: usize,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let polygon_api_key = std::env::var("POLYGON_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .context("POLYGON_API_KEY must be set")?;

        let poll_secs: u64 = match std::env::var("NOTIFICATION_POLL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("NOTIFICATION_POLL_SECS is not a number: '{}'", raw))?,
            Err(_) => 60,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:marketwatch.db".to_string()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            polygon_api_key,
            polygon_rate_limit: std::env::var("POLYGON_RATE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            poll_interval: (poll_secs > 0).then(|| Duration::from_secs(poll_secs)),
            cors_origins: parse_origins(&std::env::var("CORS_ORIGINS").unwrap_or_default()),
            name_cache_capacity: std::env::var("NAME_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(512),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
