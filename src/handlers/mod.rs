//! Event handlers and the dispatcher that routes decoded logs to them.
//!
//! Handlers load the entities an event touches, build a [`PoolDiff`] from them and
//! hand it to the aggregator. The raw event is always recorded. Missing related
//! entities are logged and the aggregate update is skipped; only configuration
//! errors (an unknown chain) are returned.

pub mod cl_pool;
pub mod events;
pub mod pool;
pub mod pool_factory;
pub mod voter;

use alloy::primitives::{Address, U256};
use bigdecimal::{BigDecimal, Zero};
use eyre::Result;

use crate::db_service::{EntityStore, FactoryActivity, FactoryService};
use crate::models::{LiquidityPoolAggregator, PoolDiff, PoolKind, Token};
use crate::sync::refresh_price;
use crate::utils::app_context::AppContext;

pub use events::{EventMeta, IndexedEvent, IndexerEvent};

/// A pool together with both of its tokens
pub struct LoadedPool {
    pub pool: LiquidityPoolAggregator,
    pub token0: Token,
    pub token1: Token,
}

/// Loads the pool that emitted `meta` and its tokens, warning when any is missing
pub fn load_pool<S: EntityStore>(store: &S, meta: &EventMeta) -> Option<LoadedPool> {
    let Some(pool) = store.get_pool(meta.chain_id, meta.src_address) else {
        log::warn!(
            "handlers::load_pool: Pool {} not found on chain {}",
            meta.src_address,
            meta.chain_id
        );
        return None;
    };
    let token0 = store.get_token(meta.chain_id, pool.token0);
    let token1 = store.get_token(meta.chain_id, pool.token1);
    match (token0, token1) {
        (Some(token0), Some(token1)) => Some(LoadedPool {
            pool,
            token0,
            token1,
        }),
        _ => {
            log::error!(
                "handlers::load_pool: Tokens of pool {} not found on chain {}",
                meta.src_address,
                meta.chain_id
            );
            None
        }
    }
}

/// Refreshes both token prices and stores the results
///
/// # Errors
/// * If the chain is not configured
pub async fn refresh_pool_tokens<S: EntityStore>(
    ctx: &AppContext,
    store: &mut S,
    loaded: &mut LoadedPool,
    meta: &EventMeta,
) -> Result<()> {
    loaded.token0 =
        refresh_price(ctx, &loaded.token0, meta.block_number, meta.block_timestamp).await?;
    loaded.token1 =
        refresh_price(ctx, &loaded.token1, meta.block_number, meta.block_timestamp).await?;
    store.set_token(loaded.token0.clone());
    store.set_token(loaded.token1.clone());
    Ok(())
}

/// Diff counting one more transaction on the pool
pub fn tx_diff(pool: &LiquidityPoolAggregator) -> PoolDiff {
    PoolDiff {
        tx_count: Some(pool.tx_count + 1),
        ..PoolDiff::default()
    }
}

pub fn native_price_usd<S: EntityStore>(store: &S, chain_id: u64) -> BigDecimal {
    store
        .get_bundle(chain_id)
        .map_or_else(BigDecimal::zero, |bundle| bundle.native_price_usd)
}

/// Folds a pool event into the pool's factory
pub fn record_factory_activity<S: EntityStore>(
    store: &mut S,
    pool: &LiquidityPoolAggregator,
    activity: &FactoryActivity,
) {
    let native_price = native_price_usd(store, pool.chain_id);
    FactoryService::record_activity(store, pool.chain_id, pool.factory, activity, &native_price);
}

/// Adds one transaction plus any volume or fees to a token's counters
pub fn record_token_activity<S: EntityStore>(
    store: &mut S,
    chain_id: u64,
    address: Address,
    volume: U256,
    volume_usd: U256,
    fees_usd: U256,
) {
    let Some(mut token) = store.get_token(chain_id, address) else {
        return;
    };
    token.tx_count += 1;
    token.volume = token.volume.saturating_add(volume);
    token.volume_usd = token.volume_usd.saturating_add(volume_usd);
    token.fees_usd = token.fees_usd.saturating_add(fees_usd);
    store.set_token(token);
}

/// Routes decoded events to their handlers, in the order given
pub struct EventProcessor {
    ctx: AppContext,
}

impl EventProcessor {
    pub const fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub const fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Applies one event to `store`.
    ///
    /// # Errors
    /// * If the event's chain is not configured
    /// * If a cache write fails
    pub async fn process<S: EntityStore>(&self, store: &mut S, indexed: &IndexedEvent) -> Result<()> {
        let ctx = &self.ctx;
        let meta = &indexed.meta;
        ctx.chains.get(meta.chain_id)?;

        log::debug!(
            "handlers::process: {} at {} from {}",
            indexed.event.name(),
            meta.event_id(),
            meta.src_address
        );
        store.set_event(meta, &indexed.event);

        match &indexed.event {
            IndexerEvent::PoolCreated {
                token0,
                token1,
                stable,
                pool,
            } => {
                let kind = if *stable {
                    PoolKind::Stable
                } else {
                    PoolKind::Volatile
                };
                pool_factory::on_pool_created(ctx, store, meta, *pool, (*token0, *token1), kind)
                    .await?;
            }
            IndexerEvent::ClPoolCreated {
                token0,
                token1,
                tick_spacing,
                pool,
            } => {
                let kind = PoolKind::Concentrated {
                    tick_spacing: *tick_spacing,
                };
                pool_factory::on_pool_created(ctx, store, meta, *pool, (*token0, *token1), kind)
                    .await?;
            }
            IndexerEvent::SetCustomFee { pool, fee } => {
                pool_factory::on_set_custom_fee(store, meta, *pool, *fee);
            }
            IndexerEvent::Swap {
                amount0_in,
                amount1_in,
                amount0_out,
                amount1_out,
                ..
            } => {
                pool::on_swap(
                    ctx,
                    store,
                    meta,
                    amount0_in.saturating_add(*amount0_out),
                    amount1_in.saturating_add(*amount1_out),
                )
                .await?;
            }
            IndexerEvent::Sync { reserve0, reserve1 } => {
                pool::on_sync(store, meta, *reserve0, *reserve1);
            }
            IndexerEvent::Mint { .. } => pool::on_mint(store, meta),
            IndexerEvent::Burn { .. } => pool::on_burn(store, meta),
            IndexerEvent::Fees { amount0, amount1, .. } => {
                pool::on_fees(store, meta, *amount0, *amount1);
            }
            IndexerEvent::ClInitialize {
                sqrt_price_x96,
                tick,
            } => {
                cl_pool::on_initialize(ctx, store, meta, *sqrt_price_x96, *tick)?;
            }
            IndexerEvent::ClSwap {
                amount0,
                amount1,
                sqrt_price_x96,
                tick,
                ..
            } => {
                cl_pool::on_swap(ctx, store, meta, (*amount0, *amount1), *sqrt_price_x96, *tick)
                    .await?;
            }
            IndexerEvent::ClMint { amount0, amount1, .. } => {
                cl_pool::on_mint(store, meta, *amount0, *amount1);
            }
            IndexerEvent::ClBurn { .. } => cl_pool::on_burn(store, meta),
            IndexerEvent::ClCollect { amount0, amount1, .. } => {
                cl_pool::on_collect(store, meta, *amount0, *amount1);
            }
            IndexerEvent::ClCollectFees { amount0, amount1, .. } => {
                cl_pool::on_collect_fees(store, meta, *amount0, *amount1);
            }
            IndexerEvent::GaugeCreated {
                pool,
                gauge,
                bribe_voting_reward,
                ..
            } => {
                voter::on_gauge_created(ctx, store, meta, *pool, *gauge, *bribe_voting_reward)?;
            }
            IndexerEvent::DistributeReward { gauge, amount, .. } => {
                voter::on_distribute_reward(ctx, store, meta, *gauge, *amount).await?;
            }
            IndexerEvent::WhitelistToken {
                token,
                is_whitelisted,
                ..
            } => {
                voter::on_whitelist_token(ctx, store, meta, *token, *is_whitelisted).await;
            }
            IndexerEvent::GaugeKilled { gauge } => {
                voter::on_gauge_liveness(ctx, store, meta, *gauge, false);
            }
            IndexerEvent::GaugeRevived { gauge } => {
                voter::on_gauge_liveness(ctx, store, meta, *gauge, true);
            }
        }
        Ok(())
    }

    /// Applies events in order, stopping at the first fatal error
    ///
    /// # Returns
    /// The number of events processed
    ///
    /// # Errors
    /// * Any error returned by [`EventProcessor::process`]
    pub async fn process_all<'a, S: EntityStore>(
        &self,
        store: &mut S,
        events: impl IntoIterator<Item = &'a IndexedEvent>,
    ) -> Result<usize> {
        let mut processed = 0;
        for event in events {
            self.process(store, event).await?;
            processed += 1;
        }
        log::info!("handlers::process_all: Processed {} events", processed);
        Ok(processed)
    }
}
