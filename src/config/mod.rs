//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::util::rate_limit::INPUT_RATE_LIMIT;
use crate::util::time::SIMULATION_TPS;

/// Highest tick rate accepted from the environment
const MAX_TICK_RATE: u32 = 240;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated); any origin when unset
    pub client_origin: Option<String>,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Inbound messages allowed per connection per second
    pub input_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        let tick_rate = match lookup("TICK_RATE") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|tps| (1..=MAX_TICK_RATE).contains(tps))
                .ok_or(ConfigError::Invalid("TICK_RATE"))?,
            None => SIMULATION_TPS,
        };

        let input_rate_limit = match lookup("INPUT_RATE_LIMIT") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("INPUT_RATE_LIMIT"))?,
            None => INPUT_RATE_LIMIT,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").filter(|s| !s.trim().is_empty()),
            tick_rate,
            input_rate_limit,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_level: "info".to_string(),
            client_origin: None,
            tick_rate: SIMULATION_TPS,
            input_rate_limit: INPUT_RATE_LIMIT,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.server_addr.port(), 3000);
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.log_level, "info");
        assert!(config.client_origin.is_none());
    }

    #[test]
    fn port_takes_precedence_over_server_addr() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9001"),
            ("SERVER_ADDR", "127.0.0.1:4000"),
        ]))
        .unwrap();
        assert_eq!(config.server_addr.port(), 9001);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("SERVER_ADDR", "nope")])),
            Err(ConfigError::InvalidAddress)
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("TICK_RATE", "0")])),
            Err(ConfigError::Invalid("TICK_RATE"))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("INPUT_RATE_LIMIT", "fast")])),
            Err(ConfigError::Invalid("INPUT_RATE_LIMIT"))
        ));
    }

    #[test]
    fn blank_origin_means_any() {
        let config = Config::from_lookup(lookup_from(&[("CLIENT_ORIGIN", "  ")])).unwrap();
        assert!(config.client_origin.is_none());
    }
}
