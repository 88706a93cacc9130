use alloy::{
    primitives::{Address, U256},
    uint,
};

/// 10^18, the scale of every normalized amount and USD price
pub const TEN_TO_THE_18: U256 = uint!(1_000_000_000_000_000_000_U256);
pub const TEN_TO_THE_6: U256 = uint!(1_000_000_U256);

/// 2^192, the square of the Q64.96 scale used by concentrated liquidity pools
pub const Q192: U256 = uint!(0x1000000000000000000000000000000000000000000000000_U256);

pub const ADDRESS_ZERO: Address = Address::ZERO;

pub const SECONDS_IN_AN_HOUR: u64 = 3_600;

/// Price refresh interval. Keyed off block time so replays are deterministic.
pub const PRICE_UPDATE_INTERVAL: u64 = SECONDS_IN_AN_HOUR;

/// `thresholdFilter` argument passed to V3 oracles
pub const ORACLE_THRESHOLD_FILTER: u64 = 10;
