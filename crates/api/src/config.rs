//! Application configuration loaded from environment variables.

use std::time::Duration;

use registry::RegistryConfig;
use saga::OrchestratorConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `HEARTBEAT_TIMEOUT_SECS` — registry staleness window (default: `60`)
/// - `SWEEP_INTERVAL_SECS` — registry sweep period (default: `15`)
/// - `CALL_TIMEOUT_SECS` — bound on each outbound saga call (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub heartbeat_timeout: Duration,
    pub sweep_interval: Duration,
    pub call_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            heartbeat_timeout: env_secs("HEARTBEAT_TIMEOUT_SECS")
                .unwrap_or(defaults.heartbeat_timeout),
            sweep_interval: env_secs("SWEEP_INTERVAL_SECS").unwrap_or(defaults.sweep_interval),
            call_timeout: env_secs("CALL_TIMEOUT_SECS").unwrap_or(defaults.call_timeout),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the registry configuration slice of this config.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            heartbeat_timeout: self.heartbeat_timeout,
            sweep_interval: self.sweep_interval,
        }
    }

    /// Returns the orchestrator configuration slice of this config.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            call_timeout: self.call_timeout,
            ..OrchestratorConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            heartbeat_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(15),
            call_timeout: Duration::from_secs(10),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}
