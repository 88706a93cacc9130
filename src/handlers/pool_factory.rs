use alloy::primitives::Address;
use eyre::Result;

use super::EventMeta;
use crate::aggregator::update_pool;
use crate::db_service::{EntityStore, FactoryService};
use crate::models::pool::generate_pool_name;
use crate::models::{LiquidityPoolAggregator, PoolDiff, PoolKind, Token};
use crate::sync::create_token_entity;
use crate::utils::app_context::AppContext;

/// Returns the stored token, creating it from on-chain metadata when missing.
/// Tokens whose metadata can't be read are logged and left out.
async fn get_or_create_token<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    chain_id: u64,
    address: Address,
) -> Option<Token> {
    if let Some(token) = store.get_token(chain_id, address) {
        return Some(token);
    }
    match create_token_entity(ctx, chain_id, address).await {
        Ok(token) => {
            store.set_token(token.clone());
            Some(token)
        }
        Err(e) => {
            log::error!(
                "handlers::pool_factory: Error fetching token details for {} on chain {}: {}",
                address,
                chain_id,
                e
            );
            None
        }
    }
}

/// Handles `PoolCreated` and `CLPoolCreated`.
///
/// Creates unseen tokens, the pool aggregate and counts the pool on the emitting
/// factory. A token joins the pool to its whitelist-pool list when the other token
/// is whitelisted.
///
/// # Errors
/// * If the chain is not configured
pub async fn on_pool_created<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    meta: &EventMeta,
    pool_address: Address,
    tokens: (Address, Address),
    kind: PoolKind,
) -> Result<()> {
    let chain_id = meta.chain_id;
    ctx.chains.get(chain_id)?;

    let token0 = get_or_create_token(ctx, store, chain_id, tokens.0).await;
    let token1 = get_or_create_token(ctx, store, chain_id, tokens.1).await;

    let symbol = |token: &Option<Token>| token.as_ref().map(|t| t.symbol.clone()).unwrap_or_default();
    let mut pool = LiquidityPoolAggregator::new(
        chain_id,
        pool_address,
        meta.src_address,
        kind,
        tokens,
        generate_pool_name(&symbol(&token0), &symbol(&token1), kind),
        meta.block_timestamp,
    );
    pool.token0_is_whitelisted = token0.as_ref().is_some_and(|t| t.is_whitelisted);
    pool.token1_is_whitelisted = token1.as_ref().is_some_and(|t| t.is_whitelisted);

    if let Some(mut token) = token0 {
        if pool.token1_is_whitelisted {
            token.add_whitelist_pool(pool_address);
            store.set_token(token);
        }
    }
    if let Some(mut token) = token1 {
        if pool.token0_is_whitelisted {
            token.add_whitelist_pool(pool_address);
            store.set_token(token);
        }
    }

    log::info!(
        "handlers::pool_factory: Created {} at {} on chain {}",
        pool.name,
        pool_address,
        chain_id
    );
    store.set_pool(pool);
    FactoryService::on_pool_created(store, chain_id, meta.src_address);
    Ok(())
}

/// Handles `SetCustomFee`: records the pool's fee override
pub fn on_set_custom_fee<S: EntityStore>(
    store: &mut S,
    meta: &EventMeta,
    pool_address: Address,
    fee: u64,
) {
    let Some(pool) = store.get_pool(meta.chain_id, pool_address) else {
        log::warn!(
            "handlers::pool_factory: Pool {} not found on chain {} for custom fee",
            pool_address,
            meta.chain_id
        );
        return;
    };
    let diff = PoolDiff {
        custom_fee: Some(fee),
        ..PoolDiff::default()
    };
    update_pool(store, &pool, &diff, meta.block_timestamp);
}
