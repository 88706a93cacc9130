use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use eyre::Result;

use crate::config::{ChainConstants, OracleVersion};
use crate::models::Token;
use crate::utils::app_context::AppContext;
use crate::utils::constants::ORACLE_THRESHOLD_FILTER;

sol! {
    interface IPriceOracle {
        function getManyRatesWithConnectors(uint8 src_len, address[] memory connectors)
            external view returns (uint256[] memory rates);
    }

    interface ISpotPriceAggregator {
        function getManyRatesWithCustomConnectors(
            address[] memory srcTokens,
            address dstToken,
            bool useWrappers,
            address[] memory customConnectors,
            uint256 thresholdFilter
        ) external view returns (uint256[] memory rates);
    }
}

/// Route tokens handed to the oracle for `block_number`: live connectors in
/// configuration order, then the reward token, the native asset and the stablecoin.
pub fn connector_list(chain: &ChainConstants, block_number: u64) -> Vec<Address> {
    let mut connectors = chain.connectors_at(block_number);
    connectors.push(chain.reward_token(block_number));
    connectors.push(chain.native_asset);
    connectors.push(chain.stablecoin);
    connectors
}

/// Builds the oracle calldata for `token` under `version`
pub fn price_calldata(
    version: OracleVersion,
    token: Address,
    stablecoin: Address,
    connectors: Vec<Address>,
) -> Vec<u8> {
    match version {
        OracleVersion::V3 => ISpotPriceAggregator::getManyRatesWithCustomConnectorsCall::new((
            vec![token],
            stablecoin,
            false,
            connectors,
            U256::from(ORACLE_THRESHOLD_FILTER),
        ))
        .abi_encode(),
        OracleVersion::V1 | OracleVersion::V2 => {
            let mut tokens = Vec::with_capacity(connectors.len() + 1);
            tokens.push(token);
            tokens.extend(connectors);
            IPriceOracle::getManyRatesWithConnectorsCall::new((1u8, tokens)).abi_encode()
        }
    }
}

fn decode_rates(version: OracleVersion, raw: &[u8]) -> Result<Vec<U256>> {
    let rates = match version {
        OracleVersion::V3 => {
            ISpotPriceAggregator::getManyRatesWithCustomConnectorsCall::abi_decode_returns(raw, true)?
                .rates
        }
        OracleVersion::V1 | OracleVersion::V2 => {
            IPriceOracle::getManyRatesWithConnectorsCall::abi_decode_returns(raw, true)?.rates
        }
    };
    Ok(rates)
}

/// Reads the USD price of `token` from the oracle version active at `block_number`.
///
/// # Returns
/// The 18-decimal USD price and the oracle version that produced it
///
/// # Errors
/// * If the chain is not configured or has no oracle for the selected version
/// * If the call fails, or returns no rates
pub async fn read_prices(
    ctx: &AppContext,
    chain_id: u64,
    token: Address,
    block_number: u64,
) -> Result<(U256, OracleVersion)> {
    let chain = ctx.chains.get(chain_id)?;
    let version = chain.select_oracle_version(block_number);
    let oracle = chain.oracle_address(version)?;
    let calldata = price_calldata(
        version,
        token,
        chain.stablecoin,
        connector_list(chain, block_number),
    );

    let raw = ctx
        .reader
        .call(chain_id, oracle, Bytes::from(calldata), Some(block_number))
        .await?;
    let rates = decode_rates(version, &raw)?;
    let price = rates
        .first()
        .copied()
        .ok_or_else(|| eyre::eyre!("Oracle {oracle} returned no rates for {token}"))?;

    Ok((price, version))
}

/// Re-reads a token's USD price when its last read is at least one update interval old.
///
/// Staleness is measured in block time, so replays issue the same reads. Blocks
/// before the chain's oracle deployment and failed oracle reads both leave the
/// token unchanged. Decimals are never touched.
///
/// # Errors
/// * If the token's chain is not configured
pub async fn refresh_price(
    ctx: &AppContext,
    token: &Token,
    block_number: u64,
    block_timestamp: u64,
) -> Result<Token> {
    let chain = ctx.chains.get(token.chain_id)?;

    if block_timestamp.saturating_sub(token.last_updated_timestamp) < chain.oracle.update_interval {
        return Ok(token.clone());
    }

    if !chain.has_oracle_at(block_number) {
        log::debug!(
            "sync::price_oracle: No oracle on chain {} at block {}, keeping price of {}",
            chain.name,
            block_number,
            token.address
        );
        return Ok(token.clone());
    }

    match read_prices(ctx, token.chain_id, token.address, block_number).await {
        Ok((price, version)) => {
            log::debug!(
                "sync::price_oracle: {} priced at {} by {} oracle at block {}",
                token.symbol,
                price,
                version,
                block_number
            );
            let mut updated = token.clone();
            updated.price_per_usd = price;
            updated.last_updated_timestamp = block_timestamp;
            Ok(updated)
        }
        Err(e) => {
            log::error!(
                "sync::price_oracle: Error refreshing price of {} on chain {} at block {}: {}",
                token.address,
                token.chain_id,
                block_number,
                e
            );
            Ok(token.clone())
        }
    }
}
