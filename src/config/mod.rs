use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "SENSOR_HUB_CONFIG";

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Record store configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    /// Database file path, or ":memory:"
    #[serde(default = "default_store_url")]
    pub url: String,
}

fn default_store_url() -> String {
    "sensores.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
        }
    }
}

impl ServiceConfig {
    /// Build the effective configuration: defaults, then the TOML file named
    /// by `SENSOR_HUB_CONFIG` (if set), then `PORT` / `STORE_URL`.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => load_config(&path)?,
            Err(_) => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment-style overrides. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %v, "Ignoring invalid PORT"),
            }
        }
        if let Some(v) = lookup("STORE_URL") {
            if !v.is_empty() {
                self.store.url = v;
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<ServiceConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: ServiceConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path))?;
    Ok(config)
}
