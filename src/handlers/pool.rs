//! Handlers for stable and volatile pools.

use alloy::primitives::U256;
use eyre::Result;

use super::{
    load_pool, record_factory_activity, record_token_activity, refresh_pool_tokens, tx_diff,
    EventMeta,
};
use crate::aggregator::{fee_accrual, liquidity_usd, reserve_prices, swap_volume, update_pool};
use crate::db_service::{EntityStore, FactoryActivity};
use crate::models::PoolDiff;
use crate::utils::app_context::AppContext;

/// Handles `Swap`. `amount0`/`amount1` are the in and out amounts summed per token.
/// Pool prices are the reserve ratios; USD values come from the tokens.
///
/// # Errors
/// * If the chain is not configured
pub async fn on_swap<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    meta: &EventMeta,
    amount0: U256,
    amount1: U256,
) -> Result<()> {
    let Some(mut loaded) = load_pool(store, meta) else {
        return Ok(());
    };
    refresh_pool_tokens(ctx, store, &mut loaded, meta).await?;
    let (pool, token0, token1) = (&loaded.pool, &loaded.token0, &loaded.token1);

    let volume = swap_volume(amount0, amount1, token0, token1);
    let (token0_price, token1_price) = reserve_prices(
        (pool.reserve0, pool.reserve1),
        (token0.decimals, token1.decimals),
    );
    let diff = PoolDiff {
        token0_price: Some(token0_price),
        token1_price: Some(token1_price),
        token0_is_whitelisted: Some(token0.is_whitelisted),
        token1_is_whitelisted: Some(token1.is_whitelisted),
        tx_count: Some(pool.tx_count + 1),
        ..volume.diff_for(pool)
    };
    let updated = update_pool(store, pool, &diff, meta.block_timestamp);

    record_token_activity(store, meta.chain_id, token0.address, amount0, volume.volume0_usd, U256::ZERO);
    record_token_activity(store, meta.chain_id, token1.address, amount1, volume.volume1_usd, U256::ZERO);
    record_factory_activity(
        store,
        &updated,
        &FactoryActivity {
            volume_usd: volume.volume_usd,
            ..FactoryActivity::default()
        },
    );
    Ok(())
}

/// Handles `Sync`: reserves become the reported values, pool prices follow the new
/// reserve ratio and liquidity is revalued at the tokens' USD prices.
pub fn on_sync<S: EntityStore>(store: &mut S, meta: &EventMeta, reserve0: U256, reserve1: U256) {
    let Some(loaded) = load_pool(store, meta) else {
        return;
    };
    let (pool, token0, token1) = (&loaded.pool, &loaded.token0, &loaded.token1);
    let decimals = (token0.decimals, token1.decimals);

    let total_liquidity_usd = liquidity_usd(
        (reserve0, reserve1),
        decimals,
        (token0.price_per_usd, token1.price_per_usd),
    );
    let (token0_price, token1_price) = reserve_prices((reserve0, reserve1), decimals);
    let diff = PoolDiff {
        reserve0: Some(reserve0),
        reserve1: Some(reserve1),
        token0_price: Some(token0_price),
        token1_price: Some(token1_price),
        total_liquidity_usd: Some(total_liquidity_usd),
        ..tx_diff(pool)
    };
    let updated = update_pool(store, pool, &diff, meta.block_timestamp);

    record_factory_activity(
        store,
        &updated,
        &FactoryActivity {
            liquidity_usd: Some((pool.total_liquidity_usd, total_liquidity_usd)),
            ..FactoryActivity::default()
        },
    );
}

pub fn on_mint<S: EntityStore>(store: &mut S, meta: &EventMeta) {
    let Some(loaded) = load_pool(store, meta) else {
        return;
    };
    let pool = &loaded.pool;
    let diff = PoolDiff {
        number_of_mints: Some(pool.number_of_mints + 1),
        ..tx_diff(pool)
    };
    let updated = update_pool(store, pool, &diff, meta.block_timestamp);
    record_token_activity(store, meta.chain_id, pool.token0, U256::ZERO, U256::ZERO, U256::ZERO);
    record_token_activity(store, meta.chain_id, pool.token1, U256::ZERO, U256::ZERO, U256::ZERO);
    record_factory_activity(store, &updated, &FactoryActivity::default());
}

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

/// Handles `Fees`, valued at the tokens' last known USD prices
pub fn on_fees<S: EntityStore>(store: &mut S, meta: &EventMeta, amount0: U256, amount1: U256) {
    let Some(loaded) = load_pool(store, meta) else {
        return;
    };
    let (pool, token0, token1) = (&loaded.pool, &loaded.token0, &loaded.token1);

    let fees = fee_accrual(pool, amount0, amount1, token0, token1);
    let mut diff = tx_diff(pool);
    fees.write_to(&mut diff);
    let updated = update_pool(store, pool, &diff, meta.block_timestamp);

    record_factory_activity(
        store,
        &updated,
        &FactoryActivity {
            fees_usd: fees.fees_usd,
            ..FactoryActivity::default()
        },
    );
}
