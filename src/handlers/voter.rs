use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use eyre::Result;

use super::EventMeta;
use crate::aggregator::update_pool;
use crate::cache::{CacheCategory, CacheRecord, PoolMapping};
use crate::db_service::EntityStore;
use crate::models::{LiquidityPoolAggregator, PoolDiff, Token};
use crate::sync::{balance_of, create_token_entity};
use crate::utils::app_context::AppContext;
use crate::utils::math::{multiply_normalized, normalize};

sol! {
    interface IVoter {
        function isAlive(address gauge) external view returns (bool);
    }
}

/// Pool a gauge was created for, as recorded by `GaugeCreated`
fn pool_for_gauge<S: EntityStore>(
    ctx: &AppContext,
    store: &S,
    chain_id: u64,
    gauge: Address,
) -> Option<LiquidityPoolAggregator> {
    let Some(pool_address) = ctx
        .cache
        .read_pool_mapping(CacheCategory::GaugeToPool, chain_id, gauge)
    else {
        log::warn!(
            "handlers::voter: No pool address found for gauge {} on chain {}",
            gauge,
            chain_id
        );
        return None;
    };
    let pool = store.get_pool(chain_id, pool_address);
    if pool.is_none() {
        log::warn!(
            "handlers::voter: Pool {} of gauge {} not found on chain {}",
            pool_address,
            gauge,
            chain_id
        );
    }
    pool
}

async fn is_alive(ctx: &AppContext, meta: &EventMeta, gauge: Address) -> Result<bool> {
    let calldata = IVoter::isAliveCall::new((gauge,)).abi_encode();
    let raw = ctx
        .reader
        .call(
            meta.chain_id,
            meta.src_address,
            Bytes::from(calldata),
            Some(meta.block_number),
        )
        .await?;
    Ok(IVoter::isAliveCall::abi_decode_returns(&raw, true)?._0)
}

/// Handles `GaugeCreated`: remembers which pool the gauge and its bribe contract
/// belong to and marks the pool's gauge as alive.
///
/// # Errors
/// * If the cache can't be written
pub fn on_gauge_created<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    meta: &EventMeta,
    pool_address: Address,
    gauge: Address,
    bribe_voting_reward: Address,
) -> Result<()> {
    let mapping = PoolMapping { pool_address };
    ctx.cache.write(
        CacheCategory::GaugeToPool,
        meta.chain_id,
        [(gauge.to_string(), CacheRecord::GaugeToPool(mapping.clone()))],
    )?;
    ctx.cache.write(
        CacheCategory::BribeToPool,
        meta.chain_id,
        [(bribe_voting_reward.to_string(), CacheRecord::BribeToPool(mapping))],
    )?;

    match store.get_pool(meta.chain_id, pool_address) {
        Some(pool) => {
            let diff = PoolDiff {
                gauge_address: Some(gauge),
                gauge_is_alive: Some(true),
                ..PoolDiff::default()
            };
            update_pool(store, &pool, &diff, meta.block_timestamp);
        }
        None => log::warn!(
            "handlers::voter: Gauge {} created for unknown pool {} on chain {}",
            gauge,
            pool_address,
            meta.chain_id
        ),
    }
    Ok(())
}

/// Handles `DistributeReward`.
///
/// Emissions accumulate as 18-decimal amounts of the chain's reward token and
/// their USD value at the reward token's stored price. Votes deposited are the
/// reward token balance held by the gauge at this block, replacing the previous
/// value. Liveness is read from the voter. Either read failing keeps the pool's
/// current value for that field.
///
/// # Errors
/// * If the chain is not configured
pub async fn on_distribute_reward<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    meta: &EventMeta,
    gauge: Address,
    amount: U256,
) -> Result<()> {
    let chain = ctx.chains.get(meta.chain_id)?;
    let reward_token_address = chain.reward_token(meta.block_number);

    let Some(reward_token) = store.get_token(meta.chain_id, reward_token_address) else {
        log::warn!(
            "handlers::voter: Reward token {} not indexed on chain {}",
            reward_token_address,
            meta.chain_id
        );
        return Ok(());
    };
    let Some(pool) = pool_for_gauge(ctx, store, meta.chain_id, gauge) else {
        return Ok(());
    };

    let (alive, deposited) = futures::join!(
        is_alive(ctx, meta, gauge),
        balance_of(ctx, meta.chain_id, reward_token_address, gauge, meta.block_number)
    );
    let alive = alive.unwrap_or_else(|e| {
        log::error!("handlers::voter: Error reading liveness of gauge {}: {}", gauge, e);
        pool.gauge_is_alive
    });
    let deposited = deposited.unwrap_or_else(|e| {
        log::error!("handlers::voter: Error reading votes of gauge {}: {}", gauge, e);
        pool.total_votes_deposited
    });

    if reward_token.price_per_usd.is_zero() {
        log::warn!(
            "handlers::voter: Reward token {} has no USD price yet on chain {}",
            reward_token.symbol,
            meta.chain_id
        );
    }
    let emissions = normalize(amount, reward_token.decimals);
    let emissions_usd = multiply_normalized(emissions, reward_token.price_per_usd);
    let votes_usd = multiply_normalized(
        normalize(deposited, reward_token.decimals),
        reward_token.price_per_usd,
    );

    let diff = PoolDiff {
        total_emissions: Some(pool.total_emissions.saturating_add(emissions)),
        total_emissions_usd: Some(pool.total_emissions_usd.saturating_add(emissions_usd)),
        total_votes_deposited: Some(deposited),
        total_votes_deposited_usd: Some(votes_usd),
        gauge_address: Some(gauge),
        gauge_is_alive: Some(alive),
        ..PoolDiff::default()
    };
    update_pool(store, &pool, &diff, meta.block_timestamp);
    Ok(())
}

/// Handles `WhitelistToken`: flips the flag on a known token, or creates the token
/// from on-chain metadata. A token whose metadata can't be read is skipped.
///
/// Only the token changes. Pools created before the flag flipped keep their
/// `token*_is_whitelisted` flags and are not added to any `whitelist_pools`; they
/// pick the new status up from their next Swap.
pub async fn on_whitelist_token<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    meta: &EventMeta,
    address: Address,
    is_whitelisted: bool,
) {
    let token = match store.get_token(meta.chain_id, address) {
        Some(token) => token,
        None => match create_token_entity(ctx, meta.chain_id, address).await {
            Ok(token) => token,
            Err(e) => {
                log::error!(
                    "handlers::voter: Error fetching token details for {} on chain {}: {}",
                    address,
                    meta.chain_id,
                    e
                );
                return;
            }
        },
    };
    log::info!(
        "handlers::voter: {} whitelisted={} on chain {}",
        token.symbol,
        is_whitelisted,
        meta.chain_id
    );
    store.set_token(Token {
        is_whitelisted,
        ..token
    });
}

/// Handles `GaugeKilled` and `GaugeRevived`
pub fn on_gauge_liveness<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    meta: &EventMeta,
    gauge: Address,
    alive: bool,
) {
    let Some(pool) = pool_for_gauge(ctx, store, meta.chain_id, gauge) else {
        return;
    };
    let diff = PoolDiff {
        gauge_is_alive: Some(alive),
        ..PoolDiff::default()
    };
    update_pool(store, &pool, &diff, meta.block_timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_service::MemoryStore;
    use crate::models::PoolKind;
    use crate::sync::erc20::IERC20;
    use crate::test_helpers::{pool, priced_token, test_context, MockReader, OP, USDC_OP, VELO, WETH_OP};
    use crate::utils::constants::TEN_TO_THE_18;
    use alloy::primitives::{address, B256};
    use std::sync::Arc;

    const POOL: Address = address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const GAUGE: Address = address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    const BRIBE: Address = address!("0xcccccccccccccccccccccccccccccccccccccccc");
    const VOTER: Address = address!("0x41C914ee0c7E1A5edCD0295623e6dC557B5aBf3C");

    fn meta() -> EventMeta {
        EventMeta {
            chain_id: 10,
            block_number: 126_000_000,
            block_timestamp: 1_700_000_000,
            log_index: 2,
            tx_hash: B256::ZERO,
            src_address: VOTER,
        }
    }

    fn setup() -> MemoryStore {
        let mut store = MemoryStore::new();
        let weth = priced_token(WETH_OP, "WETH", 18, TEN_TO_THE_18);
        let usdc = priced_token(USDC_OP, "USDC", 6, TEN_TO_THE_18);
        store.set_pool(pool(POOL, &weth, &usdc, PoolKind::Volatile));
        store.set_token(weth);
        store.set_token(usdc);
        store.set_token(priced_token(VELO, "VELO", 18, U256::from(2u64) * TEN_TO_THE_18));
        store
    }

    #[test]
    fn test_gauge_created_maps_gauge_and_bribe() {
        let ctx = test_context("voter-gauge-created", Arc::new(MockReader::new()));
        let mut store = setup();

        on_gauge_created(&ctx, &mut store, &meta(), POOL, GAUGE, BRIBE).unwrap();

        assert_eq!(
            ctx.cache.read_pool_mapping(CacheCategory::GaugeToPool, 10, GAUGE),
            Some(POOL)
        );
        assert_eq!(
            ctx.cache.read_pool_mapping(CacheCategory::BribeToPool, 10, BRIBE),
            Some(POOL)
        );
        let pool = store.get_pool(10, POOL).unwrap();
        assert_eq!(pool.gauge_address, Some(GAUGE));
        assert!(pool.gauge_is_alive);
    }

    #[tokio::test]
    async fn test_distribute_reward() {
        let reader = Arc::new(
            MockReader::new()
                .with_return(VOTER, IVoter::isAliveCall::SELECTOR, IVoter::isAliveCall::abi_encode_returns(&(true,)))
                .with_return(
                    VELO,
                    IERC20::balanceOfCall::SELECTOR,
                    IERC20::balanceOfCall::abi_encode_returns(&(U256::from(50u64) * TEN_TO_THE_18,)),
                ),
        );
        let ctx = test_context("voter-distribute", reader.clone());
        let mut store = setup();
        on_gauge_created(&ctx, &mut store, &meta(), POOL, GAUGE, BRIBE).unwrap();

        let amount = U256::from(10u64) * TEN_TO_THE_18;
        on_distribute_reward(&ctx, &mut store, &meta(), GAUGE, amount).await.unwrap();
        on_distribute_reward(&ctx, &mut store, &meta(), GAUGE, amount).await.unwrap();

        let pool = store.get_pool(10, POOL).unwrap();
        assert_eq!(pool.total_emissions, U256::from(20u64) * TEN_TO_THE_18);
        assert_eq!(pool.total_emissions_usd, U256::from(40u64) * TEN_TO_THE_18);
        // Votes are replaced, not accumulated
        assert_eq!(pool.total_votes_deposited, U256::from(50u64) * TEN_TO_THE_18);
        assert_eq!(pool.total_votes_deposited_usd, U256::from(100u64) * TEN_TO_THE_18);
        assert!(pool.gauge_is_alive);

        let calls = reader.recorded();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|call| call.block == Some(126_000_000)));
        let balance_call = calls.iter().find(|call| call.to == VELO).unwrap();
        let decoded = IERC20::balanceOfCall::abi_decode(&balance_call.calldata, true).unwrap();
        assert_eq!(decoded.account, GAUGE);
    }

    #[tokio::test]
    async fn test_distribute_reward_keeps_values_when_reads_fail() {
        let ctx = test_context("voter-distribute-fail", Arc::new(MockReader::new()));
        let mut store = setup();
        on_gauge_created(&ctx, &mut store, &meta(), POOL, GAUGE, BRIBE).unwrap();

        on_distribute_reward(&ctx, &mut store, &meta(), GAUGE, TEN_TO_THE_18).await.unwrap();

        let pool = store.get_pool(10, POOL).unwrap();
        assert_eq!(pool.total_emissions, TEN_TO_THE_18);
        assert_eq!(pool.total_votes_deposited, U256::ZERO);
        assert!(pool.gauge_is_alive);
    }

    #[tokio::test]
    async fn test_distribute_reward_for_unknown_gauge_is_skipped() {
        let reader = Arc::new(MockReader::new());
        let ctx = test_context("voter-distribute-unknown", reader.clone());
        let mut store = setup();
        let before = store.clone();

        on_distribute_reward(&ctx, &mut store, &meta(), GAUGE, TEN_TO_THE_18).await.unwrap();

        assert_eq!(store, before);
        assert_eq!(reader.call_count(), 0);
    }

    #[tokio::test]
    async fn test_whitelist_existing_and_new_token() {
        let reader = Arc::new(
            MockReader::new()
                .with_return(OP, IERC20::nameCall::SELECTOR, IERC20::nameCall::abi_encode_returns(&("Optimism".to_string(),)))
                .with_return(OP, IERC20::symbolCall::SELECTOR, IERC20::symbolCall::abi_encode_returns(&("OP".to_string(),)))
                .with_return(OP, IERC20::decimalsCall::SELECTOR, IERC20::decimalsCall::abi_encode_returns(&(18u8,))),
        );
        let ctx = test_context("voter-whitelist", reader);
        let mut store = MemoryStore::new();
        store.set_token(priced_token(WETH_OP, "WETH", 18, TEN_TO_THE_18));

        on_whitelist_token(&ctx, &mut store, &meta(), WETH_OP, false).await;
        on_whitelist_token(&ctx, &mut store, &meta(), OP, true).await;

        let weth = store.get_token(10, WETH_OP).unwrap();
        assert!(!weth.is_whitelisted);
        assert_eq!(weth.price_per_usd, TEN_TO_THE_18);

        let op = store.get_token(10, OP).unwrap();
        assert!(op.is_whitelisted);
        assert_eq!(op.symbol, "OP");
        assert_eq!(op.last_updated_timestamp, 0);
    }

    #[tokio::test]
    async fn test_whitelist_leaves_existing_pools_alone() {
        let ctx = test_context("voter-whitelist-pools", Arc::new(MockReader::new()));
        let mut store = setup();
        let velo_pool = address!("0xdddddddddddddddddddddddddddddddddddddddd");
        let mut velo = store.get_token(10, VELO).unwrap();
        velo.is_whitelisted = false;
        let weth = store.get_token(10, WETH_OP).unwrap();
        store.set_pool(pool(velo_pool, &velo, &weth, PoolKind::Volatile));
        store.set_token(velo);
        let before = store.clone();

        on_whitelist_token(&ctx, &mut store, &meta(), VELO, true).await;

        let velo = store.get_token(10, VELO).unwrap();
        assert!(velo.is_whitelisted);
        assert!(velo.whitelist_pools.is_empty());
        assert!(!store.get_pool(10, velo_pool).unwrap().token0_is_whitelisted);
        assert_eq!(store.pools, before.pools);
        assert_eq!(store.get_token(10, WETH_OP), before.get_token(10, WETH_OP));
    }

    #[tokio::test]
    async fn test_whitelist_unreadable_token_is_skipped() {
        let ctx = test_context("voter-whitelist-unreadable", Arc::new(MockReader::new()));
        let mut store = MemoryStore::new();
        on_whitelist_token(&ctx, &mut store, &meta(), OP, true).await;
        assert!(store.tokens.is_empty());
    }

    #[test]
    fn test_gauge_killed_and_revived() {
        let ctx = test_context("voter-liveness", Arc::new(MockReader::new()));
        let mut store = setup();
        on_gauge_created(&ctx, &mut store, &meta(), POOL, GAUGE, BRIBE).unwrap();

        on_gauge_liveness(&ctx, &mut store, &meta(), GAUGE, false);
        assert!(!store.get_pool(10, POOL).unwrap().gauge_is_alive);

        on_gauge_liveness(&ctx, &mut store, &meta(), GAUGE, true);
        assert!(store.get_pool(10, POOL).unwrap().gauge_is_alive);

        // Unknown gauges change nothing
        let before = store.clone();
        on_gauge_liveness(&ctx, &mut store, &meta(), BRIBE, false);
        assert_eq!(store, before);
    }
}
