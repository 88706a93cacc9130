use alloy::primitives::{Address, U256};
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};

use crate::utils::constants::ADDRESS_ZERO;

/// Roll-up of every pool deployed by one factory contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factory {
    pub address: Address,
    pub chain_id: u64,
    pub pool_count: u64,
    pub tx_count: u64,
    pub total_volume_usd: U256,
    pub total_volume_native: BigDecimal,
    pub total_fees_usd: U256,
    pub total_fees_native: BigDecimal,
    pub total_value_locked_usd: U256,
    pub total_value_locked_native: BigDecimal,
    pub owner: Address,
}

impl Factory {
    /// All counters at zero, owned by the null address
    pub fn new(chain_id: u64, address: Address) -> Self {
        Self {
            address,
            chain_id,
            pool_count: 0,
            tx_count: 0,
            total_volume_usd: U256::ZERO,
            total_volume_native: BigDecimal::zero(),
            total_fees_usd: U256::ZERO,
            total_fees_native: BigDecimal::zero(),
            total_value_locked_usd: U256::ZERO,
            total_value_locked_native: BigDecimal::zero(),
            owner: ADDRESS_ZERO,
        }
    }
}
