//! Configuration management for ScoutDeck
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with SCOUTDECK__)
//! - Configuration files (config/default, config/{env}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix, e.g. `SCOUTDECK__CLIENT__API_URL`
pub const ENV_PREFIX: &str = "SCOUTDECK";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// API client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Reference backend configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Token issuing configuration (reference backend)
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Base URL of the REST API, including the `/api` prefix
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Where the CLI keeps the login session (defaults to ~/.scoutdeck/session.json)
    pub session_file: Option<PathBuf>,

    /// Notification polling interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Prometheus exporter port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name for log records
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_api_url() -> String { "http://localhost:8000/api".to_string() }
fn default_request_timeout() -> u64 { 30 }
fn default_poll_interval() -> u64 { 30 }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_concurrent() -> usize { 100 }
fn default_access_ttl() -> u64 { 300 }
fn default_refresh_ttl() -> u64 { 86_400 }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "scoutdeck".to_string() }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout(),
            session_file: None,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env`, files and environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("SCOUTDECK_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // e.g., SCOUTDECK__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file, still honouring environment overrides
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Client request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.request_timeout_secs)
    }

    /// Notification polling interval as Duration (never below one second)
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.client.poll_interval_secs.max(1))
    }

    /// Resolved session file path
    pub fn session_file(&self) -> PathBuf {
        if let Some(path) = &self.client.session_file {
            return path.clone();
        }
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        home.join(".scoutdeck").join("session.json")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.client.api_url, "http://localhost:8000/api");
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_explicit_session_file_wins() {
        let mut config = AppConfig::default();
        config.client.session_file = Some(PathBuf::from("/tmp/scout-session.json"));
        assert_eq!(config.session_file(), PathBuf::from("/tmp/scout-session.json"));
    }

    #[test]
    fn test_poll_interval_floor() {
        let mut config = AppConfig::default();
        config.client.poll_interval_secs = 0;
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_sections_deserialize_with_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "client": { "api_url": "http://scout.local/api" },
            "auth": { "jwt_secret": "s3cret" }
        }))
        .unwrap();
        assert_eq!(config.client.api_url, "http://scout.local/api");
        assert_eq!(config.client.request_timeout_secs, 30);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.auth.access_ttl_secs, 300);
        assert_eq!(config.server.port, 8000);
    }
}
