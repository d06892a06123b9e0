//! Configuration management for the alert handler
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer built-in defaults, the JSON configuration
//! file, `ALERT_HANDLER_` environment variables and command-line overrides.

use crate::cli::Cli;
use crate::core::AlertHandler;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Listen address. A bare `:PORT` listens on all interfaces.
    pub port: String,
    /// The URL path the webhook endpoint is bound to.
    pub url_path: String,
    /// Directory that handler script names are relative to.
    pub script_directory: PathBuf,
    /// Handlers, keyed by the alert summary they match.
    #[serde(default)]
    pub alerts: HashMap<String, AlertHandler>,
    /// The logging level for the application.
    pub log_level: String,
    /// Upper bound on script invocations per second, process-wide.
    pub rate_limit_per_second: u32,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Configuration for the Prometheus endpoint.
    pub metrics: MetricsConfig,
}

/// HTTP server timeouts.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Limit on reading a request body.
    pub read_timeout_seconds: u64,
    /// Limit on handling a request and writing the response.
    pub write_timeout_seconds: u64,
    /// How long a connection may sit without sending a request head.
    pub idle_timeout_seconds: u64,
}

/// Configuration for the metrics system.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_address: String,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// A missing configuration file leaves the defaults in place; a file
    /// that exists but cannot be parsed is an error. The path is read as
    /// given, relative to the working directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli.config_path.clone().unwrap_or_else(default_config_path);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Json::file_exact(config_path))
            // e.g. ALERT_HANDLER_URL_PATH=/alerts, ALERT_HANDLER_SERVER__READ_TIMEOUT_SECONDS=2
            .merge(
                Env::prefixed("ALERT_HANDLER_")
                    .map(|key| {
                        key.as_str()
                            .to_ascii_lowercase()
                            .replace("__", ".")
                            .replace('_', "-")
                            .into()
                    }),
            )
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }

    /// The socket address to bind, expanding the `:PORT` shorthand.
    pub fn listen_address(&self) -> String {
        if self.port.starts_with(':') {
            format!("0.0.0.0{}", self.port)
        } else {
            self.port.clone()
        }
    }

    /// The route path for the webhook endpoint, always starting with `/`.
    pub fn route_path(&self) -> String {
        if self.url_path.starts_with('/') {
            self.url_path.clone()
        } else {
            format!("/{}", self.url_path)
        }
    }
}

fn home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_default()
}

/// `~/.alert-handler/alert-handler-config.json`
pub fn default_config_path() -> PathBuf {
    home_dir().join(".alert-handler").join("alert-handler-config.json")
}

/// `~/.alert-handler/scripts/`
pub fn default_script_directory() -> PathBuf {
    home_dir().join(".alert-handler").join("scripts")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: ":29000".to_string(),
            url_path: String::new(),
            script_directory: default_script_directory(),
            alerts: HashMap::new(),
            log_level: "info".to_string(),
            rate_limit_per_second: 5,
            server: ServerConfig {
                read_timeout_seconds: 5,
                write_timeout_seconds: 10,
                idle_timeout_seconds: 20,
            },
            metrics: MetricsConfig {
                enabled: false,
                listen_address: "127.0.0.1:9090".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_address_expands_bare_port() {
        let mut config = Config::default();
        assert_eq!(config.listen_address(), "0.0.0.0:29000");

        config.port = "127.0.0.1:8080".to_string();
        assert_eq!(config.listen_address(), "127.0.0.1:8080");
    }

    #[test]
    fn route_path_is_rooted() {
        let mut config = Config::default();
        assert_eq!(config.route_path(), "/");

        config.url_path = "alerts".to_string();
        assert_eq!(config.route_path(), "/alerts");

        config.url_path = "/hooks/alertmanager".to_string();
        assert_eq!(config.route_path(), "/hooks/alertmanager");
    }
}
