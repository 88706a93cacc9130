//! Native-asset pricing.
//!
//! A token's native price comes from the whitelisted pool holding the most native
//! value on the counterpart side. The bundle price (native asset in USD) comes from
//! the chain's stable pool when it has one.

use alloy::primitives::Address;
use bigdecimal::{BigDecimal, One, RoundingMode, Zero};

use crate::config::ChainConstants;
use crate::db_service::EntityStore;
use crate::models::{Bundle, LiquidityPoolAggregator, Token};
use crate::utils::math::{safe_div_decimal, to_decimal};

/// Decimal places kept on derived native prices, matching the 18-decimal fixed point
/// used everywhere else
const NATIVE_PRICE_SCALE: i64 = 18;

/// Native value locked on the side of `pool` opposite to `token`, and the price of
/// `token` that side implies. `None` when `token` is not in the pool or the
/// counterpart token isn't indexed.
fn route_through<S: EntityStore>(
    store: &S,
    pool: &LiquidityPoolAggregator,
    token: Address,
) -> Option<(BigDecimal, BigDecimal)> {
    let (other, other_reserve, other_per_token) = if pool.token0 == token {
        (pool.token1, pool.reserve1, pool.token1_price)
    } else if pool.token1 == token {
        (pool.token0, pool.reserve0, pool.token0_price)
    } else {
        return None;
    };
    let other = store.get_token(pool.chain_id, other)?;
    let locked = to_decimal(other_reserve, other.decimals) * &other.derived_native;
    let price = to_decimal(other_per_token, 18) * &other.derived_native;
    Some((
        locked.with_scale_round(NATIVE_PRICE_SCALE, RoundingMode::Down),
        price.with_scale_round(NATIVE_PRICE_SCALE, RoundingMode::Down),
    ))
}

/// Price of `token` in the native asset.
///
/// The native asset is worth exactly one and stablecoins are the inverse of the
/// bundle price. Any other token takes its price from the whitelisted pool with
/// the greatest native value locked on the counterpart side, counting only pools
/// with liquidity and more than `minimum_native_locked` locked. Pools are visited
/// in whitelist order and only a strictly greater amount replaces the current
/// best, so the earliest pool wins a tie.
///
/// # Returns
/// The derived price, or zero when no pool qualifies
pub fn native_price_per_token<S: EntityStore>(
    store: &S,
    token: &Token,
    native_asset: Address,
    stablecoins: &[Address],
    minimum_native_locked: &BigDecimal,
    bundle: &Bundle,
) -> BigDecimal {
    if token.address == native_asset {
        return BigDecimal::one();
    }
    if stablecoins.contains(&token.address) {
        return safe_div_decimal(&BigDecimal::one(), &bundle.native_price_usd);
    }

    let mut largest_locked = BigDecimal::zero();
    let mut price_so_far = BigDecimal::zero();

    for pool_address in &token.whitelist_pools {
        let Some(pool) = store.get_pool(token.chain_id, *pool_address) else {
            continue;
        };
        if pool.total_liquidity_usd.is_zero() {
            continue;
        }
        let Some((locked, price)) = route_through(store, &pool, token.address) else {
            continue;
        };
        if locked > largest_locked && &locked > minimum_native_locked {
            largest_locked = locked;
            price_so_far = price;
        }
    }

    price_so_far
}

/// Recomputes and stores the derived native price of a token
///
/// # Returns
/// The updated token, or `None` if it isn't indexed
pub fn refresh_derived_native<S: EntityStore>(
    store: &mut S,
    chain: &ChainConstants,
    address: Address,
) -> Option<Token> {
    let mut token = store.get_token(chain.chain_id, address)?;
    let bundle = store
        .get_bundle(chain.chain_id)
        .unwrap_or_else(|| Bundle::new(chain.chain_id));
    token.derived_native = native_price_per_token(
        store,
        &token,
        chain.native_asset,
        &[chain.stablecoin],
        &chain.minimum_native_locked,
        &bundle,
    );
    store.set_token(token.clone());
    Some(token)
}

/// USD price of the native asset implied by a native/stablecoin pool
pub fn stable_pool_native_price(pool: &LiquidityPoolAggregator, native_asset: Address) -> BigDecimal {
    if pool.token0 == native_asset {
        to_decimal(pool.token1_price, 18)
    } else {
        to_decimal(pool.token0_price, 18)
    }
}

/// Re-derives the chain's bundle from its stable pool and stores it.
///
/// A missing bundle is created at zero. Chains without a stable pool, or whose
/// stable pool isn't indexed yet, keep their current price.
pub fn refresh_bundle<S: EntityStore>(store: &mut S, chain: &ChainConstants) -> Bundle {
    let mut bundle = store
        .get_bundle(chain.chain_id)
        .unwrap_or_else(|| Bundle::new(chain.chain_id));

    if let Some(pool) = chain
        .stable_pool
        .and_then(|address| store.get_pool(chain.chain_id, address))
    {
        bundle.native_price_usd = stable_pool_native_price(&pool, chain.native_asset);
        log::debug!(
            "sync::native_price: Native price on {} is {} USD",
            chain.name,
            bundle.native_price_usd
        );
    }

    store.set_bundle(bundle.clone());
    bundle
}
