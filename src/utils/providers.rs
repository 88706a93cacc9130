use std::collections::HashMap;

use alloy::eips::BlockId;
use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, TxKind};
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
};
use alloy::providers::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use async_trait::async_trait;
use eyre::Result;
use url::Url;

use crate::config::{ChainTable, Config};

// There has to be a better way to do this
pub type EthereumProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

/// Read-only access to contract state on any configured chain.
///
/// Callers ABI-encode the calldata and decode the returned bytes themselves, so a
/// transport failure (an `Err` here) stays distinguishable from a return value that
/// doesn't decode.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_call` against `to`, pinned to `block` when given, otherwise the latest block.
    ///
    /// # Errors
    /// * If the chain has no provider
    /// * If the RPC request fails or the call reverts
    async fn call(
        &self,
        chain_id: u64,
        to: Address,
        calldata: Bytes,
        block: Option<u64>,
    ) -> Result<Bytes>;
}

/// Builds a call transaction without a sender
pub fn build_call(to: Address, calldata: Bytes) -> TransactionRequest {
    let mut tx = TransactionRequest::default();
    tx.to = Some(TxKind::Call(to));
    tx.input = TransactionInput::from(calldata);
    tx
}

/// [`ChainReader`] backed by one HTTP provider per chain
pub struct RpcReader {
    providers: HashMap<u64, EthereumProvider>,
}

impl RpcReader {
    /// Creates an HTTP provider for every chain in `chains`, using the `RPC_URL_<chainId>`
    /// override when configured and the chain's public endpoint otherwise.
    ///
    /// # Errors
    /// * If an RPC URL is not a valid URL
    pub fn new(config: &Config, chains: &ChainTable) -> Result<Self> {
        let mut providers = HashMap::new();
        for chain_id in chains.chain_ids() {
            let chain = chains.get(chain_id)?;
            let rpc_url = config
                .rpc_urls
                .get(&chain_id)
                .cloned()
                .unwrap_or_else(|| chain.default_rpc_url.clone());
            let url = Url::parse(&rpc_url)
                .map_err(|e| eyre::eyre!("Invalid RPC URL for chain {chain_id}: {e}"))?;
            log::debug!("utils::providers: Using {} for chain {}", url, chain.name);
            providers.insert(chain_id, ProviderBuilder::new().on_http(url));
        }
        Ok(Self { providers })
    }

    fn provider(&self, chain_id: u64) -> Result<&EthereumProvider> {
        self.providers
            .get(&chain_id)
            .ok_or_else(|| eyre::eyre!("No provider configured for chain {chain_id}"))
    }
}

#[async_trait]
impl ChainReader for RpcReader {
    async fn call(
        &self,
        chain_id: u64,
        to: Address,
        calldata: Bytes,
        block: Option<u64>,
    ) -> Result<Bytes> {
        let provider = self.provider(chain_id)?;
        let result = provider
            .call(build_call(to, calldata))
            .block(block_id(block))
            .await?;
        Ok(result)
    }
}

/// Pins a call to `block`, or to the chain head when none is given
pub fn block_id(block: Option<u64>) -> BlockId {
    block.map_or_else(BlockId::latest, BlockId::number)
}
