//! Decoded events as handed over by the log decoder.
//!
//! An [`IndexedEvent`] is one log: where it came from ([`EventMeta`]) and its
//! typed parameters ([`IndexerEvent`]). Both are plain serde types so an event log
//! can be stored as JSON lines and replayed.

use alloy::primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    pub chain_id: u64,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub log_index: u64,
    #[serde(default)]
    pub tx_hash: B256,
    /// Contract that emitted the log
    pub src_address: Address,
}

impl EventMeta {
    /// `<chainId>_<block>_<logIndex>`, unique per log
    pub fn event_id(&self) -> String {
        format!("{}_{}_{}", self.chain_id, self.block_number, self.log_index)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum IndexerEvent {
    // Factories
    PoolCreated {
        token0: Address,
        token1: Address,
        stable: bool,
        pool: Address,
    },
    #[serde(rename = "CLPoolCreated")]
    ClPoolCreated {
        token0: Address,
        token1: Address,
        tick_spacing: i32,
        pool: Address,
    },
    SetCustomFee {
        pool: Address,
        fee: u64,
    },

    // Stable and volatile pools
    Swap {
        sender: Address,
        to: Address,
        amount0_in: U256,
        amount1_in: U256,
        amount0_out: U256,
        amount1_out: U256,
    },
    Sync {
        reserve0: U256,
        reserve1: U256,
    },
    Mint {
        sender: Address,
        amount0: U256,
        amount1: U256,
    },
    Burn {
        sender: Address,
        to: Address,
        amount0: U256,
        amount1: U256,
    },
    Fees {
        sender: Address,
        amount0: U256,
        amount1: U256,
    },

    // Concentrated liquidity pools
    #[serde(rename = "CLInitialize")]
    ClInitialize {
        sqrt_price_x96: U256,
        tick: i32,
    },
    #[serde(rename = "CLSwap")]
    ClSwap {
        sender: Address,
        recipient: Address,
        amount0: I256,
        amount1: I256,
        sqrt_price_x96: U256,
        liquidity: U256,
        tick: i32,
    },
    #[serde(rename = "CLMint")]
    ClMint {
        sender: Address,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: U256,
        amount0: U256,
        amount1: U256,
    },
    #[serde(rename = "CLBurn")]
    ClBurn {
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: U256,
        amount0: U256,
        amount1: U256,
    },
    #[serde(rename = "CLCollect")]
    ClCollect {
        owner: Address,
        recipient: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount0: U256,
        amount1: U256,
    },
    #[serde(rename = "CLCollectFees")]
    ClCollectFees {
        recipient: Address,
        amount0: U256,
        amount1: U256,
    },

    // Voter
    GaugeCreated {
        pool: Address,
        gauge: Address,
        bribe_voting_reward: Address,
        fee_voting_reward: Address,
    },
    DistributeReward {
        sender: Address,
        gauge: Address,
        amount: U256,
    },
    WhitelistToken {
        whitelister: Address,
        token: Address,
        is_whitelisted: bool,
    },
    GaugeKilled {
        gauge: Address,
    },
    GaugeRevived {
        gauge: Address,
    },
}

impl IndexerEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PoolCreated { .. } => "PoolCreated",
            Self::ClPoolCreated { .. } => "CLPoolCreated",
            Self::SetCustomFee { .. } => "SetCustomFee",
            Self::Swap { .. } => "Swap",
            Self::Sync { .. } => "Sync",
            Self::Mint { .. } => "Mint",
            Self::Burn { .. } => "Burn",
            Self::Fees { .. } => "Fees",
            Self::ClInitialize { .. } => "CLInitialize",
            Self::ClSwap { .. } => "CLSwap",
            Self::ClMint { .. } => "CLMint",
            Self::ClBurn { .. } => "CLBurn",
            Self::ClCollect { .. } => "CLCollect",
            Self::ClCollectFees { .. } => "CLCollectFees",
            Self::GaugeCreated { .. } => "GaugeCreated",
            Self::DistributeReward { .. } => "DistributeReward",
            Self::WhitelistToken { .. } => "WhitelistToken",
            Self::GaugeKilled { .. } => "GaugeKilled",
            Self::GaugeRevived { .. } => "GaugeRevived",
        }
    }
}

/// One decoded log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEvent {
    pub meta: EventMeta,
    pub event: IndexerEvent,
}
