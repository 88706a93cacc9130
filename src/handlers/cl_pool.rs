//! Handlers for concentrated liquidity pools.
//!
//! Reserves here are running sums of the amounts moved by events, not balances read
//! from the pool. Liquidity is revalued at the pool's own per-token prices.

use alloy::primitives::{I256, U256};
use eyre::Result;

use super::{
    load_pool, record_factory_activity, record_token_activity, refresh_pool_tokens, tx_diff,
    EventMeta,
};
use crate::aggregator::{apply_signed, fee_accrual, liquidity_delta, liquidity_usd, swap_volume, update_pool};
use crate::db_service::{EntityStore, FactoryActivity};
use crate::models::{LiquidityPoolAggregator, PoolDiff};
use crate::sync::{refresh_bundle, refresh_derived_native};
use crate::utils::app_context::AppContext;
use crate::utils::math::{absolute, sqrt_price_x96_to_token_prices};

fn price_diff(sqrt_price_x96: U256, tick: i32, decimals: (u8, u8)) -> PoolDiff {
    let (token0_price, token1_price) =
        sqrt_price_x96_to_token_prices(sqrt_price_x96, decimals.0, decimals.1);
    PoolDiff {
        sqrt_price_x96: Some(sqrt_price_x96),
        tick: Some(tick),
        token0_price: Some(token0_price),
        token1_price: Some(token1_price),
        ..PoolDiff::default()
    }
}

/// Re-derives the bundle and both tokens' native prices after the pool's price moved
fn refresh_native_prices<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    pool: &LiquidityPoolAggregator,
) -> Result<()> {
    let chain = ctx.chains.get(pool.chain_id)?;
    refresh_bundle(store, chain);
    refresh_derived_native(store, chain, pool.token0);
    refresh_derived_native(store, chain, pool.token1);
    Ok(())
}

fn record_liquidity_change<S: EntityStore>(
    store: &mut S,
    before: &LiquidityPoolAggregator,
    after: &LiquidityPoolAggregator,
) {
    record_factory_activity(
        store,
        after,
        &FactoryActivity {
            liquidity_usd: Some((before.total_liquidity_usd, after.total_liquidity_usd)),
            ..FactoryActivity::default()
        },
    );
}

/// Handles `Initialize`: sets the starting price. Not counted as a transaction.
///
/// # Errors
/// * If the chain is not configured
pub fn on_initialize<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    meta: &EventMeta,
    sqrt_price_x96: U256,
    tick: i32,
) -> Result<()> {
    ctx.chains.get(meta.chain_id)?;
    let Some(loaded) = load_pool(store, meta) else {
        return Ok(());
    };
    let diff = price_diff(
        sqrt_price_x96,
        tick,
        (loaded.token0.decimals, loaded.token1.decimals),
    );
    let pool = update_pool(store, &loaded.pool, &diff, meta.block_timestamp);
    refresh_native_prices(ctx, store, &pool)
}

/// Handles `Swap`. Positive amounts went into the pool, negative ones left it.
///
/// # Errors
/// * If the chain is not configured
pub async fn on_swap<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    meta: &EventMeta,
    amounts: (I256, I256),
    sqrt_price_x96: U256,
    tick: i32,
) -> Result<()> {
    let Some(mut loaded) = load_pool(store, meta) else {
        return Ok(());
    };
    refresh_pool_tokens(ctx, store, &mut loaded, meta).await?;
    let (pool, token0, token1) = (&loaded.pool, &loaded.token0, &loaded.token1);

    let (volume0, volume1) = (absolute(amounts.0), absolute(amounts.1));
    let volume = swap_volume(volume0, volume1, token0, token1);

    let reserve0 = apply_signed(pool.reserve0, amounts.0);
    let reserve1 = apply_signed(pool.reserve1, amounts.1);
    let total_liquidity_usd = liquidity_usd(
        (reserve0, reserve1),
        (token0.decimals, token1.decimals),
        (pool.token0_price, pool.token1_price),
    );

    let diff = PoolDiff {
        reserve0: Some(reserve0),
        reserve1: Some(reserve1),
        total_liquidity_usd: Some(total_liquidity_usd),
        token0_is_whitelisted: Some(token0.is_whitelisted),
        token1_is_whitelisted: Some(token1.is_whitelisted),
        tx_count: Some(pool.tx_count + 1),
        ..volume.diff_for(pool)
    };
    let swapped = update_pool(store, pool, &diff, meta.block_timestamp);
    let priced = update_pool(
        store,
        &swapped,
        &price_diff(sqrt_price_x96, tick, (token0.decimals, token1.decimals)),
        meta.block_timestamp,
    );

    record_token_activity(store, meta.chain_id, token0.address, volume0, volume.volume0_usd, U256::ZERO);
    record_token_activity(store, meta.chain_id, token1.address, volume1, volume.volume1_usd, U256::ZERO);
    record_factory_activity(
        store,
        &priced,
        &FactoryActivity {
            volume_usd: volume.volume_usd,
            liquidity_usd: Some((pool.total_liquidity_usd, total_liquidity_usd)),
            ..FactoryActivity::default()
        },
    );

    refresh_native_prices(ctx, store, &priced)
}

/// Handles `Mint`: the deposited amounts join the reserves
pub fn on_mint<S: EntityStore>(store: &mut S, meta: &EventMeta, amount0: U256, amount1: U256) {
    let Some(loaded) = load_pool(store, meta) else {
        return;
    };
    let pool = &loaded.pool;
    let delta = liquidity_delta(pool, amount0, amount1, &loaded.token0, &loaded.token1);
    let diff = PoolDiff {
        reserve0: Some(delta.add_reserve0),
        reserve1: Some(delta.add_reserve1),
        total_liquidity_usd: Some(delta.add_total_liquidity_usd),
        number_of_mints: Some(pool.number_of_mints + 1),
        ..tx_diff(pool)
    };
    let updated = update_pool(store, pool, &diff, meta.block_timestamp);
    record_token_activity(store, meta.chain_id, pool.token0, U256::ZERO, U256::ZERO, U256::ZERO);
    record_token_activity(store, meta.chain_id, pool.token1, U256::ZERO, U256::ZERO, U256::ZERO);
    record_liquidity_change(store, pool, &updated);
}

/// Handles `Burn`. Burnt amounts only leave the pool once collected.
pub fn on_burn<S: EntityStore>(store: &mut S, meta: &EventMeta) {
    let Some(loaded) = load_pool(store, meta) else {
        return;
    };
    let pool = &loaded.pool;
    let diff = PoolDiff {
        number_of_burns: Some(pool.number_of_burns + 1),
        ..tx_diff(pool)
    };
    let updated = update_pool(store, pool, &diff, meta.block_timestamp);
    record_token_activity(store, meta.chain_id, pool.token0, U256::ZERO, U256::ZERO, U256::ZERO);
    record_token_activity(store, meta.chain_id, pool.token1, U256::ZERO, U256::ZERO, U256::ZERO);
    record_factory_activity(store, &updated, &FactoryActivity::default());
}

/// Handles `Collect`: collected principal leaves the reserves
pub fn on_collect<S: EntityStore>(store: &mut S, meta: &EventMeta, amount0: U256, amount1: U256) {
    let Some(loaded) = load_pool(store, meta) else {
        return;
    };
    let pool = &loaded.pool;
    let delta = liquidity_delta(pool, amount0, amount1, &loaded.token0, &loaded.token1);
    let diff = PoolDiff {
        reserve0: Some(delta.sub_reserve0),
        reserve1: Some(delta.sub_reserve1),
        total_liquidity_usd: Some(delta.sub_total_liquidity_usd),
        ..tx_diff(pool)
    };
    let updated = update_pool(store, pool, &diff, meta.block_timestamp);
    record_liquidity_change(store, pool, &updated);
}

/// Handles `CollectFees`: the amounts leave the reserves and count as fees
pub fn on_collect_fees<S: EntityStore>(store: &mut S, meta: &EventMeta, amount0: U256, amount1: U256) {
    let Some(loaded) = load_pool(store, meta) else {
        return;
    };
    let (pool, token0, token1) = (&loaded.pool, &loaded.token0, &loaded.token1);
    let delta = liquidity_delta(pool, amount0, amount1, token0, token1);
    let fees = fee_accrual(pool, amount0, amount1, token0, token1);

    let mut diff = PoolDiff {
        reserve0: Some(delta.sub_reserve0),
        reserve1: Some(delta.sub_reserve1),
        total_liquidity_usd: Some(delta.sub_total_liquidity_usd),
        ..tx_diff(pool)
    };
    fees.write_to(&mut diff);
    let updated = update_pool(store, pool, &diff, meta.block_timestamp);

    record_factory_activity(
        store,
        &updated,
        &FactoryActivity {
            fees_usd: fees.fees_usd,
            liquidity_usd: Some((pool.total_liquidity_usd, updated.total_liquidity_usd)),
            ..FactoryActivity::default()
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_service::{FactoryService, MemoryStore};
    use crate::models::PoolKind;
    use crate::test_helpers::{pool, priced_token, test_context, MockReader, FACTORY, USDC_OP, WETH_OP};
    use crate::utils::constants::{TEN_TO_THE_18, TEN_TO_THE_6};
    use alloy::primitives::{address, Address, B256};
    use bigdecimal::BigDecimal;
    use std::sync::Arc;

    const POOL: Address = address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const T0: u64 = 1_000_000;

    fn meta() -> EventMeta {
        EventMeta {
            chain_id: 10,
            block_number: 123_456,
            block_timestamp: T0,
            log_index: 7,
            tx_hash: B256::ZERO,
            src_address: POOL,
        }
    }

    /// 18-decimal WETH / 6-decimal USDC pool, both sides priced at 1 USD per unit
    fn setup() -> MemoryStore {
        let mut store = MemoryStore::new();
        let mut weth = priced_token(WETH_OP, "WETH", 18, TEN_TO_THE_18);
        let mut usdc = priced_token(USDC_OP, "USDC", 6, TEN_TO_THE_18);
        weth.last_updated_timestamp = T0;
        usdc.last_updated_timestamp = T0;
        let mut pool = pool(POOL, &weth, &usdc, PoolKind::Concentrated { tick_spacing: 100 });
        pool.token0_price = TEN_TO_THE_18;
        pool.token1_price = TEN_TO_THE_18;
        pool.reserve0 = U256::from(10u64) * TEN_TO_THE_18;
        pool.reserve1 = U256::from(10u64) * TEN_TO_THE_6;
        pool.total_liquidity_usd = U256::from(20u64) * TEN_TO_THE_18;
        store.set_token(weth);
        store.set_token(usdc);
        store.set_pool(pool);
        FactoryService::on_pool_created(&mut store, 10, FACTORY);
        store
    }

    /// sqrt(2000 * 10^6 / 10^18) * 2^96, i.e. 2000 USDC per WETH
    fn sqrt_price_2000() -> U256 {
        U256::from(3_543_191_142_285_914_205_922_034u128)
    }

    #[test]
    fn test_initialize_sets_prices_without_counting_a_tx() {
        let mut store = setup();
        let ctx = test_context("cl-initialize", Arc::new(MockReader::new()));

        on_initialize(&ctx, &mut store, &meta(), sqrt_price_2000(), -200_000).unwrap();

        let pool = store.get_pool(10, POOL).unwrap();
        assert_eq!(pool.sqrt_price_x96, sqrt_price_2000());
        assert_eq!(pool.tick, -200_000);
        assert_eq!(pool.tx_count, 0);
        // 2000 USDC per WETH, within rounding of the square root
        let price1 = pool.token1_price / TEN_TO_THE_18;
        assert!(price1 == U256::from(1999u64) || price1 == U256::from(2000u64));
        // Bundle is created even though optimism's stable pool isn't indexed here
        assert!(store.get_bundle(10).is_some());
        assert_eq!(store.get_token(10, WETH_OP).unwrap().derived_native, BigDecimal::from(1));
    }

    #[test]
    fn test_initialize_on_unknown_chain_fails() {
        let mut store = setup();
        let ctx = test_context("cl-initialize-chain", Arc::new(MockReader::new()));
        let mut meta = meta();
        meta.chain_id = 999_999;
        assert!(on_initialize(&ctx, &mut store, &meta, sqrt_price_2000(), 0).is_err());
    }

    #[test]
    fn test_mint_and_collect_move_reserves() {
        let mut store = setup();

        on_mint(&mut store, &meta(), U256::from(5u64) * TEN_TO_THE_18, U256::from(5u64) * TEN_TO_THE_6);
        let pool = store.get_pool(10, POOL).unwrap();
        assert_eq!(pool.reserve0, U256::from(15u64) * TEN_TO_THE_18);
        assert_eq!(pool.reserve1, U256::from(15u64) * TEN_TO_THE_6);
        assert_eq!(pool.total_liquidity_usd, U256::from(30u64) * TEN_TO_THE_18);
        assert_eq!(pool.number_of_mints, 1);

        on_collect(&mut store, &meta(), U256::from(20u64) * TEN_TO_THE_18, U256::from(3u64) * TEN_TO_THE_6);
        let pool = store.get_pool(10, POOL).unwrap();
        // Reserves stop at zero
        assert_eq!(pool.reserve0, U256::ZERO);
        assert_eq!(pool.reserve1, U256::from(12u64) * TEN_TO_THE_6);
        assert_eq!(pool.total_liquidity_usd, U256::from(12u64) * TEN_TO_THE_18);
        assert_eq!(pool.tx_count, 2);

        let factory = store.get_factory(10, FACTORY).unwrap();
        assert_eq!(factory.tx_count, 3);
    }

    #[test]
    fn test_burn_only_counts() {
        let mut store = setup();
        let before = store.get_pool(10, POOL).unwrap();

        on_burn(&mut store, &meta());

        let pool = store.get_pool(10, POOL).unwrap();
        assert_eq!(pool.reserve0, before.reserve0);
        assert_eq!(pool.total_liquidity_usd, before.total_liquidity_usd);
        assert_eq!(pool.number_of_burns, 1);
        assert_eq!(pool.tx_count, 1);
    }

    #[test]
    fn test_collect_fees_accrues_and_leaves_reserves() {
        let mut store = setup();

        on_collect_fees(&mut store, &meta(), U256::from(3u64) * TEN_TO_THE_18, U256::from(2u64) * TEN_TO_THE_6);

        let pool = store.get_pool(10, POOL).unwrap();
        assert_eq!(pool.reserve0, U256::from(7u64) * TEN_TO_THE_18);
        assert_eq!(pool.reserve1, U256::from(8u64) * TEN_TO_THE_6);
        assert_eq!(pool.total_fees_usd, U256::from(5u64) * TEN_TO_THE_18);
        assert_eq!(pool.total_fees_usd_whitelisted, U256::from(5u64) * TEN_TO_THE_18);
        assert_eq!(
            store.get_factory(10, FACTORY).unwrap().total_fees_usd,
            U256::from(5u64) * TEN_TO_THE_18
        );
    }

    #[tokio::test]
    async fn test_swap_moves_reserves_by_signed_amounts() {
        let mut store = setup();
        let reader = Arc::new(MockReader::new());
        let ctx = test_context("cl-swap", reader.clone());

        let amount0 = I256::try_from(2i64).unwrap() * I256::try_from(1_000_000_000_000_000_000i64).unwrap();
        let amount1 = I256::try_from(-2_000_000i64).unwrap();
        on_swap(&ctx, &mut store, &meta(), (amount0, amount1), sqrt_price_2000(), -200_000)
            .await
            .unwrap();

        assert_eq!(reader.call_count(), 0);
        let pool = store.get_pool(10, POOL).unwrap();
        assert_eq!(pool.reserve0, U256::from(12u64) * TEN_TO_THE_18);
        assert_eq!(pool.reserve1, U256::from(8u64) * TEN_TO_THE_6);
        // Valued at the prices before the swap
        assert_eq!(pool.total_liquidity_usd, U256::from(20u64) * TEN_TO_THE_18);
        assert_eq!(pool.total_volume0, U256::from(2u64) * TEN_TO_THE_18);
        assert_eq!(pool.total_volume1, U256::from(2u64) * TEN_TO_THE_6);
        assert_eq!(pool.total_volume_usd, U256::from(2u64) * TEN_TO_THE_18);
        assert_eq!(pool.number_of_swaps, 1);
        assert_eq!(pool.sqrt_price_x96, sqrt_price_2000());
        assert_eq!(pool.tick, -200_000);

        let usdc = store.get_token(10, USDC_OP).unwrap();
        assert_eq!(usdc.volume, U256::from(2u64) * TEN_TO_THE_6);
        assert_eq!(usdc.volume_usd, U256::from(2u64) * TEN_TO_THE_18);
    }
}
