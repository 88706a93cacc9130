use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use eyre::Result;

use crate::cache::TokenDetails;
use crate::models::Token;
use crate::utils::app_context::AppContext;

sol! {
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
    }
}

/// Resolves a token's name, symbol and decimals, from the cache when possible.
///
/// On a miss the three reads run concurrently. A field whose return data doesn't
/// decode falls back to `""` or `0`; the result is then cached under the
/// lower-cased address.
///
/// # Errors
/// * If the chain is not configured
/// * If any of the three calls fails at the RPC level, e.g. the address is not a
///   contract. Nothing is cached in that case.
pub async fn resolve_metadata(ctx: &AppContext, chain_id: u64, address: Address) -> Result<TokenDetails> {
    ctx.chains.get(chain_id)?;

    if let Some(details) = ctx.cache.read_token(chain_id, address) {
        return Ok(details);
    }

    log::info!(
        "sync::erc20: Cache miss for {} on chain {}, fetching token details",
        address,
        chain_id
    );

    let reader = ctx.reader.as_ref();
    let (name, decimals, symbol) = futures::try_join!(
        reader.call(chain_id, address, Bytes::from(IERC20::nameCall::new(()).abi_encode()), None),
        reader.call(chain_id, address, Bytes::from(IERC20::decimalsCall::new(()).abi_encode()), None),
        reader.call(chain_id, address, Bytes::from(IERC20::symbolCall::new(()).abi_encode()), None),
    )
    .map_err(|e| {
        log::error!(
            "sync::erc20: Error fetching token details for {} on chain {}: {}",
            address,
            chain_id,
            e
        );
        e
    })?;

    let details = TokenDetails {
        name: IERC20::nameCall::abi_decode_returns(&name, true)
            .map(|r| r._0)
            .unwrap_or_default(),
        symbol: IERC20::symbolCall::abi_decode_returns(&symbol, true)
            .map(|r| r._0)
            .unwrap_or_default(),
        decimals: IERC20::decimalsCall::abi_decode_returns(&decimals, true)
            .map(|r| r._0)
            .unwrap_or(0),
    };

    log::debug!(
        "sync::erc20: Token details fetched: name={}, decimals={}, symbol={}",
        details.name,
        details.decimals,
        details.symbol
    );

    ctx.cache.write_token(chain_id, address, details.clone())?;
    Ok(details)
}

/// Builds a never-priced [`Token`] from resolved metadata. The caller persists it.
///
/// # Errors
/// * If metadata resolution fails
pub async fn create_token_entity(ctx: &AppContext, chain_id: u64, address: Address) -> Result<Token> {
    let details = resolve_metadata(ctx, chain_id, address).await?;
    Ok(Token::new(
        chain_id,
        address,
        details.name,
        details.symbol,
        details.decimals,
    ))
}

/// `token.balanceOf(holder)` at `block_number`
///
/// # Errors
/// * If the call fails or returns something other than a `uint256`
pub async fn balance_of(
    ctx: &AppContext,
    chain_id: u64,
    token: Address,
    holder: Address,
    block_number: u64,
) -> Result<U256> {
    let calldata = IERC20::balanceOfCall::new((holder,)).abi_encode();
    let raw = ctx
        .reader
        .call(chain_id, token, Bytes::from(calldata), Some(block_number))
        .await?;
    Ok(IERC20::balanceOfCall::abi_decode_returns(&raw, true)?._0)
}
