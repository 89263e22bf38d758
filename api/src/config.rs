use infrastructure::DEFAULT_CONNECTION_STRING;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown STORE_BACKEND '{0}'. Expected 'memory' or 'mongo'.")]
    UnknownStoreBackend(String),
}

/// Which [`application::PostRepository`] implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Mongo,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Mongo => "mongo",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            other => Err(ConfigError::UnknownStoreBackend(other.to_string())),
        }
    }
}

/// Settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub store: StoreBackend,
    pub db_connection_string: String,
}

impl AppConfig {
    /// Reads `PORT`, `STORE_BACKEND` and `DB_CONNECTION_STRING` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. An invalid `PORT` falls back to the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(port_str) => match u16::from_str(port_str.trim()) {
                Ok(port_num) => {
                    info!("Using port {} from environment variable PORT.", port_num);
                    port_num
                }
                Err(_) => {
                    warn!(
                        "Invalid PORT value '{}' in environment variable. Using default port {}.",
                        port_str, DEFAULT_PORT
                    );
                    DEFAULT_PORT
                }
            },
            None => {
                info!(
                    "PORT environment variable not set. Using default port {}.",
                    DEFAULT_PORT
                );
                DEFAULT_PORT
            }
        };

        let store = match lookup("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StoreBackend::default(),
        };

        let db_connection_string = lookup("DB_CONNECTION_STRING")
            .filter(|uri| !uri.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONNECTION_STRING.to_string());

        Ok(Self {
            port,
            store,
            db_connection_string,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.db_connection_string, DEFAULT_CONNECTION_STRING);
    }

    #[test]
    fn reads_all_values() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("STORE_BACKEND", "Mongo"),
            ("DB_CONNECTION_STRING", "mongodb://db:27017/blog"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.store, StoreBackend::Mongo);
        assert_eq!(config.db_connection_string, "mongodb://db:27017/blog");
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let config = config_from(&[("PORT", "not-a-port")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        let config = config_from(&[("PORT", "70000")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn unknown_store_backend_is_an_error() {
        assert_eq!(
            config_from(&[("STORE_BACKEND", "redis")]),
            Err(ConfigError::UnknownStoreBackend("redis".to_string()))
        );
    }
}
