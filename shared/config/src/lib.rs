use serde::Serialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Settings of the data service, read from the environment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Upper bound for a single upstream request made by a source driver
    pub source_request_timeout: Duration,
    /// Upper bound for each destination probe step
    pub destination_probe_timeout: Duration,
    /// Value written to the `timeout` query parameter of ClickHouse DSNs
    pub clickhouse_dsn_timeout: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3013,
            source_request_timeout: Duration::from_secs(60),
            destination_probe_timeout: Duration::from_secs(30),
            clickhouse_dsn_timeout: "6s".to_string(),
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if dotenv::dotenv().is_ok() {
            tracing::debug!("Loaded .env file");
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            host: env::var("DATA_SERVICE_HOST").unwrap_or(defaults.host),
            port: parse_var("DATA_SERVICE_PORT")?.unwrap_or(defaults.port),
            source_request_timeout: parse_var("SOURCE_REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.source_request_timeout),
            destination_probe_timeout: parse_var("DESTINATION_PROBE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.destination_probe_timeout),
            clickhouse_dsn_timeout: env::var("CLICKHOUSE_DSN_TIMEOUT")
                .unwrap_or(defaults.clickhouse_dsn_timeout),
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 5] = [
        "DATA_SERVICE_HOST",
        "DATA_SERVICE_PORT",
        "SOURCE_REQUEST_TIMEOUT_SECS",
        "DESTINATION_PROBE_TIMEOUT_SECS",
        "CLICKHOUSE_DSN_TIMEOUT",
    ];

    fn clear() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear();
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 3013);
        assert_eq!(config.destination_probe_timeout, Duration::from_secs(30));
        assert_eq!(config.clickhouse_dsn_timeout, "6s");
    }

    #[test]
    #[serial]
    fn test_overrides_from_env() {
        clear();
        env::set_var("DATA_SERVICE_PORT", "8088");
        env::set_var("SOURCE_REQUEST_TIMEOUT_SECS", "5");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 8088);
        assert_eq!(config.source_request_timeout, Duration::from_secs(5));
        clear();
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_rejected() {
        clear();
        env::set_var("DATA_SERVICE_PORT", "not-a-port");

        let err = AppConfig::from_env().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "DATA_SERVICE_PORT".to_string(),
                value: "not-a-port".to_string(),
            }
        );
        clear();
    }
}
