use alloy::primitives::{I256, U256};

use crate::db_service::EntityStore;
use crate::models::{LiquidityPoolAggregator, LiquidityPoolSnapshot, PoolDiff, Token};
use crate::utils::constants::SECONDS_IN_AN_HOUR;
use crate::utils::math::{absolute, divide_normalized, multiply_normalized, normalize};

/// Copies every `Some` field of the diff onto the pool
macro_rules! merge {
    ($pool:ident, $diff:ident; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $diff.$field {
                $pool.$field = value;
            }
        )+
    };
}

/// Merges `diff` into a copy of `current` at block time `timestamp`.
///
/// Diff fields are absolute values, absent fields are left alone. The result is
/// stamped with `timestamp`, and when at least an hour has passed since the last
/// snapshot a snapshot of the merged pool is returned as well.
pub fn apply_diff(
    current: &LiquidityPoolAggregator,
    diff: &PoolDiff,
    timestamp: u64,
) -> (LiquidityPoolAggregator, Option<LiquidityPoolSnapshot>) {
    let mut pool = current.clone();
    merge!(pool, diff;
        token0_is_whitelisted,
        token1_is_whitelisted,
        reserve0,
        reserve1,
        total_liquidity_usd,
        total_volume0,
        total_volume1,
        total_volume_usd,
        total_volume_usd_whitelisted,
        total_fees0,
        total_fees1,
        total_fees_usd,
        total_fees_usd_whitelisted,
        number_of_swaps,
        number_of_mints,
        number_of_burns,
        tx_count,
        token0_price,
        token1_price,
        sqrt_price_x96,
        tick,
        total_emissions,
        total_emissions_usd,
        total_bribes_usd,
        total_votes_deposited,
        total_votes_deposited_usd,
        gauge_is_alive,
    );
    if let Some(fee) = diff.custom_fee {
        pool.custom_fee = Some(fee);
    }
    if let Some(gauge) = diff.gauge_address {
        pool.gauge_address = Some(gauge);
    }

    pool.last_updated_timestamp = timestamp;

    let snapshot = if timestamp.saturating_sub(pool.last_snapshot_timestamp) >= SECONDS_IN_AN_HOUR {
        pool.last_snapshot_timestamp = timestamp;
        Some(LiquidityPoolSnapshot::new(&pool, timestamp))
    } else {
        None
    };

    (pool, snapshot)
}

/// Applies `diff` and persists the pool, plus its snapshot when one is due
pub fn update_pool<S: EntityStore>(
    store: &mut S,
    current: &LiquidityPoolAggregator,
    diff: &PoolDiff,
    timestamp: u64,
) -> LiquidityPoolAggregator {
    let (pool, snapshot) = apply_diff(current, diff, timestamp);
    if let Some(snapshot) = snapshot {
        log::debug!(
            "aggregator::update_pool: Snapshot {} taken",
            snapshot.id
        );
        store.push_snapshot(snapshot);
    }
    store.set_pool(pool.clone());
    pool
}

/// USD value of the given reserves at the given 18-decimal prices
pub fn liquidity_usd(
    reserves: (U256, U256),
    decimals: (u8, u8),
    prices: (U256, U256),
) -> U256 {
    multiply_normalized(normalize(reserves.0, decimals.0), prices.0)
        .saturating_add(multiply_normalized(normalize(reserves.1, decimals.1), prices.1))
}

/// Spot prices implied by a pair's reserves, in the same form the CL pools report:
/// `(token0 per token1, token1 per token0)` at 18 decimals. An empty side prices
/// both at zero.
pub fn reserve_prices(reserves: (U256, U256), decimals: (u8, u8)) -> (U256, U256) {
    let reserve0 = normalize(reserves.0, decimals.0);
    let reserve1 = normalize(reserves.1, decimals.1);
    if reserve0.is_zero() || reserve1.is_zero() {
        return (U256::ZERO, U256::ZERO);
    }
    (
        divide_normalized(reserve0, reserve1),
        divide_normalized(reserve1, reserve0),
    )
}

/// Pool liquidity after adding or removing an event's amounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiquidityDelta {
    pub add_reserve0: U256,
    pub add_reserve1: U256,
    pub sub_reserve0: U256,
    pub sub_reserve1: U256,
    pub add_total_liquidity_usd: U256,
    pub sub_total_liquidity_usd: U256,
}

/// Computes both directions of a liquidity change so the caller can pick the one
/// its event means: mints add, burns and collects subtract. Values use the pool's
/// current per-token prices. Subtraction stops at zero.
pub fn liquidity_delta(
    pool: &LiquidityPoolAggregator,
    amount0: U256,
    amount1: U256,
    token0: &Token,
    token1: &Token,
) -> LiquidityDelta {
    let decimals = (token0.decimals, token1.decimals);
    let prices = (pool.token0_price, pool.token1_price);

    let add_reserve0 = pool.reserve0.saturating_add(amount0);
    let add_reserve1 = pool.reserve1.saturating_add(amount1);
    let sub_reserve0 = pool.reserve0.saturating_sub(amount0);
    let sub_reserve1 = pool.reserve1.saturating_sub(amount1);

    LiquidityDelta {
        add_reserve0,
        add_reserve1,
        sub_reserve0,
        sub_reserve1,
        add_total_liquidity_usd: liquidity_usd((add_reserve0, add_reserve1), decimals, prices),
        sub_total_liquidity_usd: liquidity_usd((sub_reserve0, sub_reserve1), decimals, prices),
    }
}

/// Moves a reserve by a signed swap delta, never below zero
pub fn apply_signed(reserve: U256, delta: I256) -> U256 {
    if delta.is_negative() {
        reserve.saturating_sub(absolute(delta))
    } else {
        reserve.saturating_add(absolute(delta))
    }
}

/// Cumulative fee totals after one fee event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeAccrual {
    pub total_fees0: U256,
    pub total_fees1: U256,
    pub total_fees_usd: U256,
    pub total_fees_usd_whitelisted: U256,
    /// USD value of this event's fees alone
    pub fees_usd: U256,
}

impl FeeAccrual {
    pub fn write_to(&self, diff: &mut PoolDiff) {
        diff.total_fees0 = Some(self.total_fees0);
        diff.total_fees1 = Some(self.total_fees1);
        diff.total_fees_usd = Some(self.total_fees_usd);
        diff.total_fees_usd_whitelisted = Some(self.total_fees_usd_whitelisted);
    }
}

/// Adds fee amounts to the pool totals. Each token's USD share counts towards the
/// whitelisted total only when that token is whitelisted.
pub fn fee_accrual(
    pool: &LiquidityPoolAggregator,
    amount0: U256,
    amount1: U256,
    token0: &Token,
    token1: &Token,
) -> FeeAccrual {
    let fees0_usd = multiply_normalized(normalize(amount0, token0.decimals), token0.price_per_usd);
    let fees1_usd = multiply_normalized(normalize(amount1, token1.decimals), token1.price_per_usd);

    let mut whitelisted = U256::ZERO;
    if token0.is_whitelisted {
        whitelisted = whitelisted.saturating_add(fees0_usd);
    }
    if token1.is_whitelisted {
        whitelisted = whitelisted.saturating_add(fees1_usd);
    }
    let fees_usd = fees0_usd.saturating_add(fees1_usd);

    FeeAccrual {
        total_fees0: pool.total_fees0.saturating_add(amount0),
        total_fees1: pool.total_fees1.saturating_add(amount1),
        total_fees_usd: pool.total_fees_usd.saturating_add(fees_usd),
        total_fees_usd_whitelisted: pool.total_fees_usd_whitelisted.saturating_add(whitelisted),
        fees_usd,
    }
}

/// What a single swap adds to volume totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapVolume {
    pub volume0: U256,
    pub volume1: U256,
    pub volume0_usd: U256,
    pub volume1_usd: U256,
    /// token0's USD volume when priced, otherwise token1's
    pub volume_usd: U256,
    /// token0's USD volume when both tokens are whitelisted, otherwise zero
    pub volume_usd_whitelisted: U256,
}

/// Values the swapped magnitudes in USD at the tokens' current prices
pub fn swap_volume(amount0: U256, amount1: U256, token0: &Token, token1: &Token) -> SwapVolume {
    let volume0_usd = multiply_normalized(normalize(amount0, token0.decimals), token0.price_per_usd);
    let volume1_usd = multiply_normalized(normalize(amount1, token1.decimals), token1.price_per_usd);

    SwapVolume {
        volume0: amount0,
        volume1: amount1,
        volume0_usd,
        volume1_usd,
        volume_usd: if volume0_usd.is_zero() { volume1_usd } else { volume0_usd },
        volume_usd_whitelisted: if token0.is_whitelisted && token1.is_whitelisted {
            volume0_usd
        } else {
            U256::ZERO
        },
    }
}

impl SwapVolume {
    /// Diff carrying the pool's new volume totals and swap count
    pub fn diff_for(&self, pool: &LiquidityPoolAggregator) -> PoolDiff {
        PoolDiff {
            total_volume0: Some(pool.total_volume0.saturating_add(self.volume0)),
            total_volume1: Some(pool.total_volume1.saturating_add(self.volume1)),
            total_volume_usd: Some(pool.total_volume_usd.saturating_add(self.volume_usd)),
            total_volume_usd_whitelisted: Some(
                pool.total_volume_usd_whitelisted
                    .saturating_add(self.volume_usd_whitelisted),
            ),
            number_of_swaps: Some(pool.number_of_swaps + 1),
            ..PoolDiff::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_service::MemoryStore;
    use crate::models::PoolKind;
    use crate::test_helpers::{pool, priced_token, OP, USDC_OP, WETH_OP};
    use crate::utils::constants::{TEN_TO_THE_18, TEN_TO_THE_6};
    use alloy::primitives::address;

    const POOL: alloy::primitives::Address = address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

    fn tokens() -> (Token, Token) {
        (
            priced_token(WETH_OP, "WETH", 18, TEN_TO_THE_18),
            priced_token(USDC_OP, "USDC", 6, TEN_TO_THE_18),
        )
    }

    #[test]
    fn test_apply_diff_only_touches_present_fields() {
        let (t0, t1) = tokens();
        let mut current = pool(POOL, &t0, &t1, PoolKind::Volatile);
        current.reserve1 = U256::from(7u64);
        current.number_of_swaps = 4;

        let diff = PoolDiff {
            reserve0: Some(U256::from(100u64)),
            gauge_address: Some(OP),
            ..PoolDiff::default()
        };
        let (updated, _) = apply_diff(&current, &diff, 600);

        assert_eq!(updated.reserve0, U256::from(100u64));
        assert_eq!(updated.reserve1, U256::from(7u64));
        assert_eq!(updated.number_of_swaps, 4);
        assert_eq!(updated.gauge_address, Some(OP));
        assert_eq!(updated.last_updated_timestamp, 600);
    }

    #[test]
    fn test_snapshot_taken_once_an_hour() {
        let (t0, t1) = tokens();
        let current = pool(POOL, &t0, &t1, PoolKind::Stable);
        let diff = PoolDiff::default();

        let (after_59m, snapshot) = apply_diff(&current, &diff, 59 * 60);
        assert!(snapshot.is_none());
        assert_eq!(after_59m.last_snapshot_timestamp, 0);

        let (after_1h, snapshot) = apply_diff(&after_59m, &diff, 3600);
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.timestamp, 3600);
        assert_eq!(snapshot.pool, after_1h);
        assert_eq!(after_1h.last_snapshot_timestamp, 3600);
        assert_eq!(
            snapshot.id,
            format!("10_{POOL}_3600")
        );

        let (_, snapshot) = apply_diff(&after_1h, &diff, 3600 + 1800);
        assert!(snapshot.is_none());
    }

    #[test]
    fn test_update_pool_persists_pool_and_snapshot() {
        let (t0, t1) = tokens();
        let current = pool(POOL, &t0, &t1, PoolKind::Stable);
        let mut store = MemoryStore::new();

        let diff = PoolDiff {
            tx_count: Some(1),
            ..PoolDiff::default()
        };
        let updated = update_pool(&mut store, &current, &diff, 7200);

        assert_eq!(store.get_pool(10, POOL), Some(updated));
        assert_eq!(store.snapshots.len(), 1);
    }

    #[test]
    fn test_fee_accrual_across_decimals() {
        let (t0, t1) = tokens();
        let mut current = pool(POOL, &t0, &t1, PoolKind::Volatile);
        current.total_fees_usd = TEN_TO_THE_18;
        current.total_fees_usd_whitelisted = TEN_TO_THE_18;

        let accrual = fee_accrual(
            &current,
            U256::from(3u64) * TEN_TO_THE_18,
            U256::from(2u64) * TEN_TO_THE_6,
            &t0,
            &t1,
        );

        assert_eq!(accrual.total_fees0, U256::from(3u64) * TEN_TO_THE_18);
        assert_eq!(accrual.total_fees1, U256::from(2u64) * TEN_TO_THE_6);
        assert_eq!(accrual.fees_usd, U256::from(5u64) * TEN_TO_THE_18);
        assert_eq!(accrual.total_fees_usd, U256::from(6u64) * TEN_TO_THE_18);
        assert_eq!(accrual.total_fees_usd_whitelisted, U256::from(6u64) * TEN_TO_THE_18);
    }

    #[test]
    fn test_fee_accrual_whitelists_per_token() {
        let (t0, mut t1) = tokens();
        t1.is_whitelisted = false;
        let current = pool(POOL, &t0, &t1, PoolKind::Volatile);

        let accrual = fee_accrual(
            &current,
            U256::from(3u64) * TEN_TO_THE_18,
            U256::from(2u64) * TEN_TO_THE_6,
            &t0,
            &t1,
        );
        assert_eq!(accrual.total_fees_usd, U256::from(5u64) * TEN_TO_THE_18);
        assert_eq!(accrual.total_fees_usd_whitelisted, U256::from(3u64) * TEN_TO_THE_18);
    }

    #[test]
    fn test_reserve_prices_across_decimals() {
        // 10 WETH against 30 USDC
        let (price0, price1) = reserve_prices(
            (U256::from(10u64) * TEN_TO_THE_18, U256::from(30u64) * TEN_TO_THE_6),
            (18, 6),
        );
        assert_eq!(price1, U256::from(3u64) * TEN_TO_THE_18);
        assert_eq!(price0, U256::from(333_333_333_333_333_333u64));

        let empty = reserve_prices((U256::ZERO, U256::from(30u64) * TEN_TO_THE_6), (18, 6));
        assert_eq!(empty, (U256::ZERO, U256::ZERO));
    }

    #[test]
    fn test_liquidity_delta_both_directions() {
        let (t0, t1) = tokens();
        let mut current = pool(POOL, &t0, &t1, PoolKind::Volatile);
        current.reserve0 = U256::from(10u64) * TEN_TO_THE_18;
        current.reserve1 = U256::from(10u64) * TEN_TO_THE_6;
        current.token0_price = U256::from(2u64) * TEN_TO_THE_18;
        current.token1_price = TEN_TO_THE_18;

        let delta = liquidity_delta(
            &current,
            U256::from(5u64) * TEN_TO_THE_18,
            U256::from(20u64) * TEN_TO_THE_6,
            &t0,
            &t1,
        );

        assert_eq!(delta.add_reserve0, U256::from(15u64) * TEN_TO_THE_18);
        // 15 * 2 + 30 * 1
        assert_eq!(delta.add_total_liquidity_usd, U256::from(60u64) * TEN_TO_THE_18);
        // token1 can't go below zero
        assert_eq!(delta.sub_reserve1, U256::ZERO);
        assert_eq!(delta.sub_total_liquidity_usd, U256::from(10u64) * TEN_TO_THE_18);
    }

    #[test]
    fn test_swap_volume_whitelist_gating() {
        let (t0, mut t1) = tokens();
        let amount0 = U256::from(2u64) * TEN_TO_THE_18;
        let amount1 = U256::from(2u64) * TEN_TO_THE_6;

        let both = swap_volume(amount0, amount1, &t0, &t1);
        assert_eq!(both.volume_usd, U256::from(2u64) * TEN_TO_THE_18);
        assert_eq!(both.volume_usd_whitelisted, U256::from(2u64) * TEN_TO_THE_18);

        t1.is_whitelisted = false;
        let one = swap_volume(amount0, amount1, &t0, &t1);
        assert_eq!(one.volume_usd, U256::from(2u64) * TEN_TO_THE_18);
        assert_eq!(one.volume_usd_whitelisted, U256::ZERO);

        let current = pool(POOL, &t0, &t1, PoolKind::Volatile);
        let diff = one.diff_for(&current);
        assert_eq!(diff.total_volume_usd, Some(U256::from(2u64) * TEN_TO_THE_18));
        assert_eq!(diff.total_volume_usd_whitelisted, Some(U256::ZERO));
        assert_eq!(diff.number_of_swaps, Some(1));
    }

    #[test]
    fn test_swap_volume_falls_back_to_token1() {
        let (mut t0, t1) = tokens();
        t0.price_per_usd = U256::ZERO;
        let volume = swap_volume(TEN_TO_THE_18, U256::from(3u64) * TEN_TO_THE_6, &t0, &t1);
        assert_eq!(volume.volume_usd, U256::from(3u64) * TEN_TO_THE_18);
    }

    #[test]
    fn test_apply_signed_saturates() {
        let reserve = U256::from(10u64);
        assert_eq!(apply_signed(reserve, I256::try_from(5i64).unwrap()), U256::from(15u64));
        assert_eq!(apply_signed(reserve, I256::try_from(-4i64).unwrap()), U256::from(6u64));
        assert_eq!(apply_signed(reserve, I256::try_from(-40i64).unwrap()), U256::ZERO);
    }
}
