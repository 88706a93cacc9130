use alloy::primitives::{Address, U256};
use bigdecimal::{BigDecimal, Zero};
use core::fmt::{self, Display};
use serde::{Deserialize, Serialize};

/// Globally unique identifier for a token to distinguish between different chains
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Debug, Serialize, Deserialize)]
pub struct TokenId {
    pub chain_id: u64,
    pub address: Address,
}

impl TokenId {
    pub const fn new(chain_id: u64, address: Address) -> Self {
        Self { chain_id, address }
    }
}

impl Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.chain_id, self.address)
    }
}

/// An ERC-20 as seen by the indexer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub address: Address,
    pub chain_id: u64,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// USD price, 18-decimal fixed point
    pub price_per_usd: U256,
    /// Price in the chain's native asset
    pub derived_native: BigDecimal,
    pub is_whitelisted: bool,
    /// Block timestamp of the last oracle read, 0 when never priced
    pub last_updated_timestamp: u64,
    /// Pools where the other side is whitelisted, in discovery order
    pub whitelist_pools: Vec<Address>,
    pub volume: U256,
    pub volume_usd: U256,
    pub fees_usd: U256,
    pub tx_count: u64,
}

impl Token {
    pub fn new(
        chain_id: u64,
        address: Address,
        name: String,
        symbol: String,
        decimals: u8,
    ) -> Self {
        Self {
            address,
            chain_id,
            symbol: sanitize_string(&symbol),
            name: sanitize_string(&name),
            decimals,
            price_per_usd: U256::ZERO,
            derived_native: BigDecimal::zero(),
            is_whitelisted: false,
            last_updated_timestamp: 0,
            whitelist_pools: Vec::new(),
            volume: U256::ZERO,
            volume_usd: U256::ZERO,
            fees_usd: U256::ZERO,
            tx_count: 0,
        }
    }

    pub const fn id(&self) -> TokenId {
        TokenId::new(self.chain_id, self.address)
    }

    /// Appends `pool` to the whitelist-pool list unless it's already there
    pub fn add_whitelist_pool(&mut self, pool: Address) {
        if !self.whitelist_pools.contains(&pool) {
            self.whitelist_pools.push(pool);
        }
    }
}

/// Sanitizes a given string by:
/// 1. Converting any invalid UTF-8 sequences to the replacement character ``.
/// 2. Removing any null byte characters (`\0`).
///
/// # Arguments
/// * `value` - A string slice that represents the value to be sanitized.
///
/// # Returns
/// A new `String` with invalid UTF-8 replaced and null bytes removed.
pub fn sanitize_string(value: &str) -> String {
    let sanitized = String::from_utf8_lossy(value.as_bytes()).to_string();
    sanitized.replace('\0', "")
}
