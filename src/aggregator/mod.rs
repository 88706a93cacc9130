pub mod pool;

pub use pool::{
    apply_diff, apply_signed, fee_accrual, liquidity_delta, liquidity_usd, reserve_prices,
    swap_volume, update_pool, FeeAccrual, LiquidityDelta, SwapVolume,
};
