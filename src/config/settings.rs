use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the HTTP/WebSocket host binds to
    pub server: ServerSettings,
    /// Port channel and icon behaviour
    pub relay: RelaySettings,
    /// Inspector store defaults
    pub inspector: InspectorSettings,
    /// Default tracing filter directive (RUST_LOG still wins)
    pub log_filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    /// Buffered messages per channel direction
    pub channel_capacity: usize,
    /// Disable the icon when a tab starts loading
    pub suppress_loading_flicker: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectorSettings {
    pub record_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8097,
            },
            relay: RelaySettings {
                channel_capacity: 256,
                suppress_loading_flicker: false,
            },
            inspector: InspectorSettings {
                record_on_start: false,
            },
            log_filter: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TomlServerConfig {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TomlRelayConfig {
    channel_capacity: Option<usize>,
    suppress_loading_flicker: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TomlInspectorConfig {
    record_on_start: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TomlLoggingConfig {
    filter: Option<String>,
}

/// TOML file layout; every section and key is optional
#[derive(Debug, Clone, Default, Deserialize)]
struct TomlConfig {
    server: Option<TomlServerConfig>,
    relay: Option<TomlRelayConfig>,
    inspector: Option<TomlInspectorConfig>,
    logging: Option<TomlLoggingConfig>,
}

impl Config {
    /// Load configuration from the data directory, merging with defaults.
    /// Problems with the file are logged and the defaults kept.
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        match Self::load_from_path(&config_file) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Using default configuration");
                Config::default()
            }
        }
    }

    /// Load configuration from a specific file. A missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let toml_config: TomlConfig = toml::from_str(contents)?;
        let mut config = Config::default();

        if let Some(server) = toml_config.server {
            if let Some(host) = server.host {
                config.server.host = host;
            }
            if let Some(port) = server.port {
                config.server.port = port;
            }
        }

        if let Some(relay) = toml_config.relay {
            if let Some(capacity) = relay.channel_capacity {
                config.relay.channel_capacity = capacity.max(1);
            }
            if let Some(suppress) = relay.suppress_loading_flicker {
                config.relay.suppress_loading_flicker = suppress;
            }
        }

        if let Some(inspector) = toml_config.inspector {
            if let Some(record_on_start) = inspector.record_on_start {
                config.inspector.record_on_start = record_on_start;
            }
        }

        if let Some(filter) = toml_config.logging.and_then(|logging| logging.filter) {
            config.log_filter = filter;
        }

        Ok(config)
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
