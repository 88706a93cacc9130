use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};

/// Per-chain reference price of the native asset
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub chain_id: u64,
    pub native_price_usd: BigDecimal,
}

impl Bundle {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            native_price_usd: BigDecimal::zero(),
        }
    }
}
