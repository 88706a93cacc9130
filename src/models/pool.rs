use alloy::primitives::{Address, U256};
use core::fmt::{self, Display};
use serde::{Deserialize, Serialize};

/// Pool flavour, which also decides the pool's display name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PoolKind {
    Stable,
    Volatile,
    #[serde(rename_all = "camelCase")]
    Concentrated { tick_spacing: i32 },
}

impl PoolKind {
    pub const fn is_concentrated(self) -> bool {
        matches!(self, Self::Concentrated { .. })
    }
}

impl Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "Stable"),
            Self::Volatile => write!(f, "Volatile"),
            Self::Concentrated { tick_spacing } => write!(f, "CL-{tick_spacing}"),
        }
    }
}

/// e.g. `Volatile AMM - WETH/USDC` or `CL-100 AMM - WETH/USDC`
pub fn generate_pool_name(token0_symbol: &str, token1_symbol: &str, kind: PoolKind) -> String {
    format!("{kind} AMM - {token0_symbol}/{token1_symbol}")
}

/// Running totals for one pool. Monetary fields are 18-decimal fixed point; per-token
/// amounts keep the token's own decimals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityPoolAggregator {
    pub address: Address,
    pub chain_id: u64,
    pub name: String,
    pub kind: PoolKind,
    pub factory: Address,
    pub token0: Address,
    pub token1: Address,
    pub token0_is_whitelisted: bool,
    pub token1_is_whitelisted: bool,

    pub reserve0: U256,
    pub reserve1: U256,
    pub total_liquidity_usd: U256,

    pub total_volume0: U256,
    pub total_volume1: U256,
    pub total_volume_usd: U256,
    pub total_volume_usd_whitelisted: U256,

    pub total_fees0: U256,
    pub total_fees1: U256,
    pub total_fees_usd: U256,
    pub total_fees_usd_whitelisted: U256,

    pub number_of_swaps: u64,
    pub number_of_mints: u64,
    pub number_of_burns: u64,
    pub tx_count: u64,

    /// Instantaneous per-token prices
    pub token0_price: U256,
    pub token1_price: U256,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub custom_fee: Option<u64>,

    pub total_emissions: U256,
    pub total_emissions_usd: U256,
    pub total_bribes_usd: U256,
    pub total_votes_deposited: U256,
    pub total_votes_deposited_usd: U256,
    pub gauge_address: Option<Address>,
    pub gauge_is_alive: bool,

    pub last_updated_timestamp: u64,
    pub last_snapshot_timestamp: u64,
}

impl LiquidityPoolAggregator {
    /// Fresh aggregate for a newly created pool
    pub fn new(
        chain_id: u64,
        address: Address,
        factory: Address,
        kind: PoolKind,
        tokens: (Address, Address),
        name: String,
        timestamp: u64,
    ) -> Self {
        Self {
            address,
            chain_id,
            name,
            kind,
            factory,
            token0: tokens.0,
            token1: tokens.1,
            token0_is_whitelisted: false,
            token1_is_whitelisted: false,
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            total_liquidity_usd: U256::ZERO,
            total_volume0: U256::ZERO,
            total_volume1: U256::ZERO,
            total_volume_usd: U256::ZERO,
            total_volume_usd_whitelisted: U256::ZERO,
            total_fees0: U256::ZERO,
            total_fees1: U256::ZERO,
            total_fees_usd: U256::ZERO,
            total_fees_usd_whitelisted: U256::ZERO,
            number_of_swaps: 0,
            number_of_mints: 0,
            number_of_burns: 0,
            tx_count: 0,
            token0_price: U256::ZERO,
            token1_price: U256::ZERO,
            sqrt_price_x96: U256::ZERO,
            tick: 0,
            custom_fee: None,
            total_emissions: U256::ZERO,
            total_emissions_usd: U256::ZERO,
            total_bribes_usd: U256::ZERO,
            total_votes_deposited: U256::ZERO,
            total_votes_deposited_usd: U256::ZERO,
            gauge_address: None,
            gauge_is_alive: false,
            last_updated_timestamp: timestamp,
            last_snapshot_timestamp: timestamp,
        }
    }

    pub fn has_token(&self, token: Address) -> bool {
        self.token0 == token || self.token1 == token
    }
}

/// Sparse set of new absolute values for a [`LiquidityPoolAggregator`].
///
/// `None` leaves the field untouched. Values are never deltas.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolDiff {
    pub token0_is_whitelisted: Option<bool>,
    pub token1_is_whitelisted: Option<bool>,
    pub reserve0: Option<U256>,
    pub reserve1: Option<U256>,
    pub total_liquidity_usd: Option<U256>,
    pub total_volume0: Option<U256>,
    pub total_volume1: Option<U256>,
    pub total_volume_usd: Option<U256>,
    pub total_volume_usd_whitelisted: Option<U256>,
    pub total_fees0: Option<U256>,
    pub total_fees1: Option<U256>,
    pub total_fees_usd: Option<U256>,
    pub total_fees_usd_whitelisted: Option<U256>,
    pub number_of_swaps: Option<u64>,
    pub number_of_mints: Option<u64>,
    pub number_of_burns: Option<u64>,
    pub tx_count: Option<u64>,
    pub token0_price: Option<U256>,
    pub token1_price: Option<U256>,
    pub sqrt_price_x96: Option<U256>,
    pub tick: Option<i32>,
    pub custom_fee: Option<u64>,
    pub total_emissions: Option<U256>,
    pub total_emissions_usd: Option<U256>,
    pub total_bribes_usd: Option<U256>,
    pub total_votes_deposited: Option<U256>,
    pub total_votes_deposited_usd: Option<U256>,
    pub gauge_address: Option<Address>,
    pub gauge_is_alive: Option<bool>,
}

/// Copy of a pool aggregate taken at most once per hour
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityPoolSnapshot {
    pub id: String,
    pub timestamp: u64,
    pub pool: LiquidityPoolAggregator,
}

impl LiquidityPoolSnapshot {
    pub fn new(pool: &LiquidityPoolAggregator, timestamp: u64) -> Self {
        Self {
            id: format!("{}_{}_{}", pool.chain_id, pool.address, timestamp),
            timestamp,
            pool: pool.clone(),
        }
    }
}
