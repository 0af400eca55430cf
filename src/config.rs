//! Configuration loading.
//!
//! Grounded in `binance_etl/library/factory.py` and
//! `binance_etl/library/utils.py::load_config` from the Python source this
//! crate is a rewrite of: a small JSON document, pointed to by an
//! environment variable, enumerating storage selection and dotted
//! subscription identifiers.

use std::{env, fs, str::FromStr};

use serde_derive::Deserialize;

const ENV_VAR_CONFIG_PATH: &str = "DEPTH_RECORDER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file at {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config document")]
    Parse(#[from] serde_json::Error),
    #[error("invalid subscription '{0}': expected 'exchange.market.symbol.event'")]
    InvalidSubscription(String),
    #[error("unsupported exchange '{0}' in subscription '{1}'")]
    UnsupportedExchange(String, String),
    #[error("unsupported event kind '{0}' in subscription '{1}'")]
    UnsupportedEvent(String, String),
    #[error("storage backend '{0}' is not supported")]
    UnsupportedStorageBackend(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub subscriptions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: String,
    pub csv: CsvStorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvStorageConfig {
    pub batch_size: usize,
    pub base_path: String,
}

/// A single `(market, symbol, event_kind)` subscription, resolved and
/// validated from its dotted wire form (`exchange.market.symbol.event`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub exchange: String,
    pub market: String,
    pub symbol: String,
    pub event: EventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Depth,
    Trade,
}

impl FromStr for Subscription {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split('.').collect();
        let [exchange, market, symbol, event] = parts[..] else {
            return Err(ConfigError::InvalidSubscription(raw.to_string()));
        };
        if exchange != "binance" {
            return Err(ConfigError::UnsupportedExchange(
                exchange.to_string(),
                raw.to_string(),
            ));
        }
        let event = match event {
            "depth" => EventKind::Depth,
            "trade" => EventKind::Trade,
            other => {
                return Err(ConfigError::UnsupportedEvent(
                    other.to_string(),
                    raw.to_string(),
                ))
            }
        };
        Ok(Subscription {
            exchange: exchange.to_string(),
            market: market.to_string(),
            symbol: symbol.to_string(),
            event,
        })
    }
}

impl Config {
    /// Loads config from the path named by `DEPTH_RECORDER_CONFIG`,
    /// defaulting to `config.json`.
    pub fn load() -> Result<Config, ConfigError> {
        let path = env::var(ENV_VAR_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &str) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_str(&raw)
    }

    pub fn from_str(raw: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        if config.storage.backend != "csv" {
            return Err(ConfigError::UnsupportedStorageBackend(
                config.storage.backend.clone(),
            ));
        }
        config.resolved_subscriptions()?;
        Ok(config)
    }

    /// Parses and validates every subscription, failing fast before any
    /// pipeline is built: a malformed config is a startup error, not a
    /// per-pipeline one.
    pub fn resolved_subscriptions(&self) -> Result<Vec<Subscription>, ConfigError> {
        self.subscriptions
            .iter()
            .map(|raw| raw.parse())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "storage": { "backend": "csv", "csv": { "batch_size": 500, "base_path": "./data" } },
        "subscriptions": ["binance.spot.btcusdt.depth", "binance.spot.btcusdt.trade"]
    }"#;

    #[test]
    fn parses_a_well_formed_document() {
        let config = Config::from_str(SAMPLE).expect("valid config");
        assert_eq!(config.storage.csv.batch_size, 500);
        let subs = config.resolved_subscriptions().expect("valid subscriptions");
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].event, EventKind::Depth);
        assert_eq!(subs[1].event, EventKind::Trade);
    }

    #[test]
    fn rejects_unsupported_storage_backend() {
        let raw = SAMPLE.replace("\"backend\": \"csv\"", "\"backend\": \"bigquery\"");
        let err = Config::from_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedStorageBackend(_)));
    }

    #[test]
    fn rejects_malformed_subscription() {
        let raw = SAMPLE.replace("binance.spot.btcusdt.depth", "binance.spot.depth");
        let err = Config::from_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSubscription(_)));
    }

    #[test]
    fn rejects_unknown_event_kind() {
        let raw = SAMPLE.replace("btcusdt.depth", "btcusdt.ticker");
        let err = Config::from_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedEvent(_, _)));
    }
}
