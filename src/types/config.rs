//! Configuration structures.
//!
//! Configuration is loaded from environment variables; every field has a
//! documented default so the server runs with no configuration at all.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Resolver and executor limits.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-caller admission limits.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address.
    pub listen_addr: String,

    /// Allowed CORS origins. Empty list means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8787".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Resolver and executor limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the package registry. Module manifests are fetched from
    /// `{registry_url}/{package}@{version}/manifest.json` unless the request
    /// carries an explicit `importUrl`.
    pub registry_url: String,

    /// Wall-clock budget for a single tool execution.
    #[serde(with = "humantime_serde")]
    pub execution_timeout: Duration,

    /// Timeout for a single manifest fetch on the cache-miss path.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,

    /// Memory ceiling advertised for isolated execution runners, in MB.
    /// Not enforced in-process; surfaced via `/health` so operators can see
    /// what an isolated runner variant would be configured with.
    pub memory_limit_mb: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_url: "https://registry.toolhost.dev/modules".to_string(),
            execution_timeout: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(30),
            memory_limit_mb: 128,
        }
    }
}

/// Per-caller admission limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum calls per identity within the rolling window.
    pub max_requests: u32,

    /// Rolling window length.
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(3600),
        }
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// Recognized variables: `TOOLHOST_LISTEN_ADDR`, `TOOLHOST_CORS_ORIGINS`
    /// (comma-separated), `TOOLHOST_REGISTRY_URL`, `TOOLHOST_TIMEOUT_MS`,
    /// `TOOLHOST_FETCH_TIMEOUT_MS`, `TOOLHOST_MEMORY_LIMIT_MB`,
    /// `TOOLHOST_RATE_LIMIT`, `TOOLHOST_RATE_WINDOW_SECS`,
    /// `TOOLHOST_LOG_LEVEL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("TOOLHOST_LISTEN_ADDR") {
            config.server.listen_addr = addr;
        }
        if let Ok(origins) = std::env::var("TOOLHOST_CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(url) = std::env::var("TOOLHOST_REGISTRY_URL") {
            config.engine.registry_url = url;
        }
        if let Some(ms) = env_u64("TOOLHOST_TIMEOUT_MS") {
            config.engine.execution_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("TOOLHOST_FETCH_TIMEOUT_MS") {
            config.engine.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(mb) = env_u64("TOOLHOST_MEMORY_LIMIT_MB") {
            config.engine.memory_limit_mb = mb;
        }
        if let Some(n) = env_u64("TOOLHOST_RATE_LIMIT") {
            config.rate_limit.max_requests = n as u32;
        }
        if let Some(secs) = env_u64("TOOLHOST_RATE_WINDOW_SECS") {
            config.rate_limit.window = Duration::from_secs(secs);
        }
        if let Ok(level) = std::env::var("TOOLHOST_LOG_LEVEL") {
            config.observability.log_level = level;
        }

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window, Duration::from_secs(3600));
        assert_eq!(config.engine.execution_timeout, Duration::from_secs(300));
        assert_eq!(config.engine.memory_limit_mb, 128);
        assert!(config.server.cors_origins.is_empty());
    }

    #[test]
    fn test_roundtrip_serde() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server.listen_addr, config.server.listen_addr);
    }
}
