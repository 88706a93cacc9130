//! Application context shared by every handler.
//!
//! Holds the immutable chain table, the durable metadata cache and the on-chain
//! reader. Everything is behind an `Arc` so the context is cheap to clone into
//! per-chain tasks.

use std::sync::Arc;

use eyre::Result;
use log::info;

use crate::cache::MetadataCache;
use crate::config::{ChainTable, Config};
use crate::utils::providers::{ChainReader, RpcReader};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub chains: Arc<ChainTable>,
    pub cache: Arc<MetadataCache>,
    pub reader: Arc<dyn ChainReader>,
}

impl AppContext {
    /// Creates a context with an RPC-backed reader for every configured chain.
    ///
    /// # Errors
    /// * If the connectors file can't be loaded
    /// * If an RPC URL is invalid
    pub fn new(config: Config) -> Result<Self> {
        let chains = config.chain_table()?;
        let reader = RpcReader::new(&config, &chains)?;
        info!(
            "utils::app_context: Indexing {} chains, cache at {}",
            chains.chain_ids().len(),
            config.cache_dir.display()
        );
        Ok(Self::with_reader(config, chains, Arc::new(reader)))
    }

    /// Creates a context around an existing reader
    pub fn with_reader(config: Config, chains: ChainTable, reader: Arc<dyn ChainReader>) -> Self {
        let cache = MetadataCache::new(config.cache_dir.clone());
        Self {
            config: Arc::new(config),
            chains: Arc::new(chains),
            cache: Arc::new(cache),
            reader,
        }
    }
}
