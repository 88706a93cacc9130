pub mod chains;

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use eyre::Result;

pub use chains::{ChainConstants, ChainTable, OracleVersion, PriceConnector};

/// Configuration struct for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub log_level: log::LevelFilter,
    /// RPC endpoint overrides keyed by chain id
    pub rpc_urls: HashMap<u64, String>,
    pub price_connectors_file: Option<PathBuf>,
}

impl Config {
    /// Default values for configuration
    fn defaults() -> Self {
        Self {
            cache_dir: PathBuf::from("./.cache"),
            log_level: log::LevelFilter::Info,
            rpc_urls: HashMap::new(),
            price_connectors_file: None,
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Environment Variables:
    /// - `CACHE_DIR`: Folder holding the metadata cache files
    /// - `LOG_LEVEL`: `error`, `warn`, `info`, `debug` or `trace`
    /// - `RPC_URL_<chainId>`: RPC endpoint for a chain, e.g. `RPC_URL_10`
    /// - `PRICE_CONNECTORS_FILE`: JSON file overriding the built-in price connectors
    ///
    /// # Errors
    /// * If `LOG_LEVEL` is not a valid level
    /// * If an `RPC_URL_` suffix is not a chain id
    pub fn from_env() -> Result<Self> {
        let defaults = Self::defaults();

        let log_level = match env::var("LOG_LEVEL") {
            Ok(level) => log::LevelFilter::from_str(&level)
                .map_err(|_| eyre::eyre!("Invalid LOG_LEVEL: {level}"))?,
            Err(_) => defaults.log_level,
        };

        let mut rpc_urls = HashMap::new();
        for (key, value) in env::vars() {
            if let Some(chain_id) = key.strip_prefix("RPC_URL_") {
                let chain_id = chain_id
                    .parse::<u64>()
                    .map_err(|_| eyre::eyre!("Invalid chain id in {key}"))?;
                rpc_urls.insert(chain_id, value);
            }
        }

        Ok(Self {
            cache_dir: env::var("CACHE_DIR").map_or(defaults.cache_dir, PathBuf::from),
            log_level,
            rpc_urls,
            price_connectors_file: env::var("PRICE_CONNECTORS_FILE").ok().map(PathBuf::from),
        })
    }

    /// Static chain table with the configured connector overrides applied
    ///
    /// # Errors
    /// * If the connectors file can't be read or parsed
    pub fn chain_table(&self) -> Result<ChainTable> {
        let table = ChainTable::default();
        match &self.price_connectors_file {
            Some(path) => table.with_connectors_file(path),
            None => Ok(table),
        }
    }

    /// Create a test configuration
    #[cfg(test)]
    #[must_use]
    pub fn test_config() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("CACHE_DIR", "/tmp/pool-indexer-cache");
        env::set_var("LOG_LEVEL", "debug");
        env::set_var("RPC_URL_8453", "http://localhost:8545");

        let config = Config::from_env().unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/pool-indexer-cache"));
        assert_eq!(config.log_level, log::LevelFilter::Debug);
        assert_eq!(
            config.rpc_urls.get(&8453).map(String::as_str),
            Some("http://localhost:8545")
        );

        env::remove_var("CACHE_DIR");
        env::remove_var("LOG_LEVEL");
        env::remove_var("RPC_URL_8453");
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::test_config();
        assert_eq!(config.cache_dir, PathBuf::from("./.cache"));
        assert_eq!(config.log_level, log::LevelFilter::Info);
        assert!(config.rpc_urls.is_empty());
        assert!(config.chain_table().is_ok());
    }
}
