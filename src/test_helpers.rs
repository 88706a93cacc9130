use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::{address, Address, Bytes, U256};
use async_trait::async_trait;
use eyre::Result;

use crate::config::{ChainTable, Config};
use crate::models::{LiquidityPoolAggregator, PoolKind, Token};
use crate::utils::app_context::AppContext;
use crate::utils::providers::ChainReader;

pub const WETH_OP: Address = address!("0x4200000000000000000000000000000000000006");
pub const USDC_OP: Address = address!("0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85");
pub const OP: Address = address!("0x4200000000000000000000000000000000000042");
pub const VELO: Address = address!("0x9560e827aF36c94D2Ac33a39bCE1Fe78631088Db");
pub const FACTORY: Address = address!("0xF1046053aa5682b4F9a81b5481394DA16BE5FF5a");

#[derive(Clone)]
enum Scripted {
    Return(Bytes),
    Fail(String),
}

/// A recorded `eth_call`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub to: Address,
    pub calldata: Bytes,
    pub block: Option<u64>,
}

/// [`ChainReader`] answering from a script keyed by `(contract, selector)`.
/// Unscripted calls fail like a revert would.
#[derive(Default)]
pub struct MockReader {
    script: HashMap<(Address, [u8; 4]), Scripted>,
    calls: AtomicUsize,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl MockReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_return(mut self, to: Address, selector: [u8; 4], data: Vec<u8>) -> Self {
        self.script
            .insert((to, selector), Scripted::Return(Bytes::from(data)));
        self
    }

    pub fn with_failure(mut self, to: Address, selector: [u8; 4], reason: &str) -> Self {
        self.script
            .insert((to, selector), Scripted::Fail(reason.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ChainReader for MockReader {
    async fn call(
        &self,
        _chain_id: u64,
        to: Address,
        calldata: Bytes,
        block: Option<u64>,
    ) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                to,
                calldata: calldata.clone(),
                block,
            });

        let mut selector = [0u8; 4];
        if calldata.len() >= 4 {
            selector.copy_from_slice(&calldata[..4]);
        }
        match self.script.get(&(to, selector)) {
            Some(Scripted::Return(data)) => Ok(data.clone()),
            Some(Scripted::Fail(reason)) => Err(eyre::eyre!("{reason}")),
            None => Err(eyre::eyre!("execution reverted: unscripted call to {to}")),
        }
    }
}

/// Unique, empty cache folder for one test
pub fn temp_cache_dir(name: &str) -> PathBuf {
    let folder = std::env::temp_dir().join(format!(
        "pool-indexer-test-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&folder);
    folder
}

/// Context over the default chain table with a fresh cache folder
pub fn test_context(name: &str, reader: Arc<dyn ChainReader>) -> AppContext {
    let config = Config {
        cache_dir: temp_cache_dir(name),
        ..Config::test_config()
    };
    AppContext::with_reader(config, ChainTable::default(), reader)
}

pub fn token(address: Address, symbol: &str, decimals: u8) -> Token {
    Token::new(10, address, symbol.to_string(), symbol.to_string(), decimals)
}

pub fn priced_token(address: Address, symbol: &str, decimals: u8, price_per_usd: U256) -> Token {
    let mut token = token(address, symbol, decimals);
    token.price_per_usd = price_per_usd;
    token.is_whitelisted = true;
    token
}

pub fn pool(address: Address, token0: &Token, token1: &Token, kind: PoolKind) -> LiquidityPoolAggregator {
    let mut pool = LiquidityPoolAggregator::new(
        token0.chain_id,
        address,
        FACTORY,
        kind,
        (token0.address, token1.address),
        crate::models::pool::generate_pool_name(&token0.symbol, &token1.symbol, kind),
        0,
    );
    pool.token0_is_whitelisted = token0.is_whitelisted;
    pool.token1_is_whitelisted = token1.is_whitelisted;
    pool
}
