//! Configuration management for pkgsearch.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Error, Result};
use crate::ratelimit::LimiterConfig;

/// Main configuration for the pkgsearch service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Requests allowed per client per window
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Window length, e.g. "1m" or "30s"
    #[serde(default = "default_window", with = "humantime_serde")]
    pub window: Duration,

    /// Reclamation cadence; twice the window when unset
    #[serde(default, with = "humantime_serde")]
    pub cleanup_interval: Option<Duration>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window: default_window(),
            cleanup_interval: None,
        }
    }
}

fn default_limit() -> u32 {
    60
}

fn default_window() -> Duration {
    Duration::from_secs(60)
}

impl RateLimitingConfig {
    /// Validate and convert into a limiter configuration.
    pub fn limiter_config(&self) -> Result<LimiterConfig> {
        let config = LimiterConfig::new(self.limit, self.window)?;
        match self.cleanup_interval {
            Some(interval) => config.with_cleanup_interval(interval),
            None => Ok(config),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.http_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.rate_limiting.limit, 60);
        assert_eq!(config.rate_limiting.window, Duration::from_secs(60));
        assert_eq!(config.rate_limiting.cleanup_interval, None);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
server:
  http_addr: "0.0.0.0:9000"
rate_limiting:
  limit: 100
  window: 30s
  cleanup_interval: 5m
"#;

        let config = assert_ok!(AppConfig::from_yaml(yaml));
        assert_eq!(config.server.http_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.rate_limiting.limit, 100);
        assert_eq!(config.rate_limiting.window, Duration::from_secs(30));
        assert_eq!(
            config.rate_limiting.cleanup_interval,
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_parse_partial_config_fills_defaults() {
        let yaml = r#"
rate_limiting:
  limit: 5
"#;

        let config = assert_ok!(AppConfig::from_yaml(yaml));
        assert_eq!(config.server.http_addr, default_http_addr());
        assert_eq!(config.rate_limiting.limit, 5);
        assert_eq!(config.rate_limiting.window, Duration::from_secs(60));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = AppConfig::from_yaml("rate_limiting: [not, a, map]");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = AppConfig::from_file("/nonexistent/pkgsearch.yaml");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_limiter_config_derives_cleanup_interval() {
        let config = RateLimitingConfig {
            limit: 10,
            window: Duration::from_secs(15),
            cleanup_interval: None,
        };

        let limiter_config = assert_ok!(config.limiter_config());
        assert_eq!(limiter_config.limit, 10);
        assert_eq!(limiter_config.cleanup_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_limiter_config_rejects_zero_limit() {
        let config = RateLimitingConfig {
            limit: 0,
            ..RateLimitingConfig::default()
        };

        assert!(matches!(config.limiter_config(), Err(Error::Config(_))));
    }
}
