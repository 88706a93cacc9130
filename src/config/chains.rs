//! Static per-chain configuration.
//!
//! Built once at startup and shared behind an `Arc`. Nothing here changes at runtime.

use std::collections::HashMap;
use std::path::Path;

use alloy::primitives::{address, Address};
use bigdecimal::{BigDecimal, Zero};
use derive_more::Display;
use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::utils::constants::PRICE_UPDATE_INTERVAL;

const DEFAULT_NATIVE_ASSET: Address = address!("0x4200000000000000000000000000000000000006");
const SHARED_V3_ORACLE: Address = address!("0xe58920a8c684CD3d6dCaC2a41b12998e4CB17EfE");
const SHARED_V2_ORACLE: Address = address!("0xE50621a0527A43534D565B67D64be7C79807F269");
const SUPERCHAIN_REWARD_TOKEN: Address = address!("0x7f9AdFbd38b669F03d1d11000Bc76b9AaEA28A81");

/// Price oracle protocol generations, ordered by deployment
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum OracleVersion {
    #[display("v1")]
    V1,
    #[display("v2")]
    V2,
    #[display("v3")]
    V3,
}

/// Intermediate token used to build price discovery paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceConnector {
    pub address: Address,
    /// First block at which the connector may be used
    pub created_block: u64,
}

#[derive(Debug, Clone)]
pub struct OracleSchedule {
    /// Blocks before this have no oracle at all
    pub start_block: u64,
    /// `(first block, version)` pairs, ascending by block
    pub thresholds: Vec<(u64, OracleVersion)>,
    pub addresses: Vec<(OracleVersion, Address)>,
    /// Minimum seconds of block time between two price reads of a token
    pub update_interval: u64,
}

impl OracleSchedule {
    fn single(version: OracleVersion, oracle: Address, start_block: u64) -> Self {
        Self {
            start_block,
            thresholds: vec![(0, version)],
            addresses: vec![(version, oracle)],
            update_interval: PRICE_UPDATE_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChainConstants {
    pub chain_id: u64,
    pub name: String,
    /// Wrapped native asset, the anchor for derived native prices
    pub native_asset: Address,
    pub stablecoin: Address,
    /// native/stablecoin pool whose price feeds the bundle
    pub stable_pool: Option<Address>,
    pub minimum_native_locked: BigDecimal,
    pub oracle: OracleSchedule,
    pub price_connectors: Vec<PriceConnector>,
    /// `(first block, token)` pairs, ascending by block
    pub reward_tokens: Vec<(u64, Address)>,
    pub default_rpc_url: String,
}

impl ChainConstants {
    /// Highest oracle version whose threshold is at or below `block_number`.
    pub fn select_oracle_version(&self, block_number: u64) -> OracleVersion {
        self.oracle
            .thresholds
            .iter()
            .take_while(|(threshold, _)| *threshold <= block_number)
            .last()
            .or_else(|| self.oracle.thresholds.first())
            .map_or(OracleVersion::V3, |(_, version)| *version)
    }

    /// # Errors
    /// * If the chain has no deployment for `version`
    pub fn oracle_address(&self, version: OracleVersion) -> Result<Address> {
        self.oracle
            .addresses
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, address)| *address)
            .ok_or_else(|| eyre::eyre!("No {version} oracle on chain {}", self.chain_id))
    }

    pub const fn has_oracle_at(&self, block_number: u64) -> bool {
        block_number >= self.oracle.start_block
    }

    /// Connectors already deployed at `block_number`, in configuration order
    pub fn connectors_at(&self, block_number: u64) -> Vec<Address> {
        self.price_connectors
            .iter()
            .filter(|connector| connector.created_block <= block_number)
            .map(|connector| connector.address)
            .collect()
    }

    pub fn reward_token(&self, block_number: u64) -> Address {
        self.reward_tokens
            .iter()
            .take_while(|(from, _)| *from <= block_number)
            .last()
            .or_else(|| self.reward_tokens.first())
            .map_or(Address::ZERO, |(_, token)| *token)
    }

    pub fn is_stablecoin(&self, token: Address) -> bool {
        token == self.stablecoin
    }
}

/// Immutable lookup of [`ChainConstants`] by chain id
#[derive(Debug, Clone)]
pub struct ChainTable {
    chains: HashMap<u64, ChainConstants>,
}

impl ChainTable {
    pub fn new(chains: impl IntoIterator<Item = ChainConstants>) -> Self {
        Self {
            chains: chains
                .into_iter()
                .map(|chain| (chain.chain_id, chain))
                .collect(),
        }
    }

    /// # Errors
    /// * If the chain is not configured
    pub fn get(&self, chain_id: u64) -> Result<&ChainConstants> {
        self.chains
            .get(&chain_id)
            .ok_or_else(|| eyre::eyre!("Unsupported chain id: {chain_id}"))
    }

    /// Sorted ids of every configured chain
    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// # Errors
    /// * If the chain is not configured
    pub fn select_oracle_version(&self, chain_id: u64, block_number: u64) -> Result<OracleVersion> {
        Ok(self.get(chain_id)?.select_oracle_version(block_number))
    }

    /// # Errors
    /// * If the chain is not configured or has no oracle for `version`
    pub fn oracle_address(&self, chain_id: u64, version: OracleVersion) -> Result<Address> {
        self.get(chain_id)?.oracle_address(version)
    }

    /// Replaces connector lists with the ones in a JSON file shaped like
    /// `{ "10": [{ "address": "0x..", "createdBlock": 123 }] }`.
    ///
    /// # Errors
    /// * If the file can't be read or parsed
    /// * If it names a chain that is not configured
    pub fn with_connectors_file(mut self, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: HashMap<String, Vec<PriceConnector>> = serde_json::from_str(&raw)?;
        for (chain_id, connectors) in parsed {
            let chain_id = chain_id
                .parse::<u64>()
                .map_err(|_| eyre::eyre!("Invalid chain id in connectors file: {chain_id}"))?;
            let chain = self
                .chains
                .get_mut(&chain_id)
                .ok_or_else(|| eyre::eyre!("Unsupported chain id: {chain_id}"))?;
            log::info!(
                "config::chains: Loaded {} price connectors for chain {}",
                connectors.len(),
                chain_id
            );
            chain.price_connectors = connectors;
        }
        Ok(self)
    }
}

struct ChainSeed {
    chain_id: u64,
    name: &'static str,
    stablecoin: Address,
    oracle: OracleSchedule,
    default_rpc_url: &'static str,
}

impl From<ChainSeed> for ChainConstants {
    fn from(seed: ChainSeed) -> Self {
        Self {
            chain_id: seed.chain_id,
            name: seed.name.to_string(),
            native_asset: DEFAULT_NATIVE_ASSET,
            stablecoin: seed.stablecoin,
            stable_pool: None,
            minimum_native_locked: BigDecimal::zero(),
            oracle: seed.oracle,
            price_connectors: Vec::new(),
            reward_tokens: vec![(0, SUPERCHAIN_REWARD_TOKEN)],
            default_rpc_url: seed.default_rpc_url.to_string(),
        }
    }
}

/// Routes available from genesis of the oracle deployments. The reward token, the
/// native asset and the stablecoin are appended per call and aren't listed here.
fn connectors(addresses: &[Address]) -> Vec<PriceConnector> {
    addresses
        .iter()
        .map(|address| PriceConnector {
            address: *address,
            created_block: 0,
        })
        .collect()
}

fn optimism() -> ChainConstants {
    ChainConstants {
        price_connectors: connectors(&[
            // OP
            address!("0x4200000000000000000000000000000000000042"),
            // USDC.e
            address!("0x7F5c764cBc14f9669B88837ca1490cCa17c31607"),
            // DAI
            address!("0xDA10009cBd5D07dd0CeCc66161FC93D7c9000da1"),
            // USDT
            address!("0x94b008aA00579c1307B0EF2c499aD98a8ce58e58"),
            // WBTC
            address!("0x68f180fcCe6836688e9084f035309E29Bf0A2095"),
            // wstETH
            address!("0x1F32b1c2345538c0c6f582fCB022739c4A194Ebb"),
        ]),
        reward_tokens: vec![
            (0, address!("0x3c8B650257cFb5f272f799F5e2b4e65093a11a05")),
            (105_896_880, address!("0x9560e827aF36c94D2Ac33a39bCE1Fe78631088Db")),
        ],
        ..ChainConstants::from(ChainSeed {
            chain_id: 10,
            name: "optimism",
            stablecoin: address!("0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
            oracle: OracleSchedule {
                start_block: 107_676_013,
                thresholds: vec![
                    (0, OracleVersion::V1),
                    (124_076_662, OracleVersion::V2),
                    (125_484_892, OracleVersion::V3),
                ],
                addresses: vec![
                    (OracleVersion::V1, address!("0x395942C2049604a314d39F370Dfb8D87AAC89e16")),
                    (OracleVersion::V2, address!("0x6a3af44e23395d2470f7c81331add6ede8597306")),
                    (OracleVersion::V3, address!("0x59114D308C6DE4A84F5F8cD80485a5481047b99f")),
                ],
                update_interval: PRICE_UPDATE_INTERVAL,
            },
            default_rpc_url: "https://optimism.llamarpc.com",
        })
    }
}

fn base() -> ChainConstants {
    ChainConstants {
        price_connectors: connectors(&[
            // USDbC
            address!("0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA"),
            // DAI
            address!("0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb"),
            // cbETH
            address!("0x2Ae3F1Ec7F1F5012CFEab0185bfc7aa3cf0DEc22"),
        ]),
        reward_tokens: vec![(0, address!("0x940181a94A35A4569E4529A3CDfB74e38FD98631"))],
        ..ChainConstants::from(ChainSeed {
            chain_id: 8453,
            name: "base",
            stablecoin: address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            oracle: OracleSchedule {
                start_block: 3_219_857,
                thresholds: vec![
                    (0, OracleVersion::V1),
                    (18_480_097, OracleVersion::V2),
                    (19_862_773, OracleVersion::V3),
                ],
                addresses: vec![
                    (OracleVersion::V1, SHARED_V3_ORACLE),
                    (OracleVersion::V2, address!("0xcbf5b6abf55fb87271338097fdd03e9d82a9d63f")),
                    (OracleVersion::V3, address!("0x3B06c787711ecb5624cE65AC8F26cde10831eb0C")),
                ],
                update_interval: PRICE_UPDATE_INTERVAL,
            },
            default_rpc_url: "https://base.llamarpc.com",
        })
    }
}

/// Chains that started on the shared V2 oracle and later moved to their own V3 deployment
fn v2_then_v3(
    chain_id: u64,
    name: &'static str,
    stablecoin: Address,
    v3_block: u64,
    v3_oracle: Address,
    start_block: u64,
    default_rpc_url: &'static str,
) -> ChainConstants {
    ChainSeed {
        chain_id,
        name,
        stablecoin,
        oracle: OracleSchedule {
            start_block,
            thresholds: vec![(0, OracleVersion::V2), (v3_block, OracleVersion::V3)],
            addresses: vec![
                (OracleVersion::V1, SHARED_V2_ORACLE),
                (OracleVersion::V2, SHARED_V2_ORACLE),
                (OracleVersion::V3, v3_oracle),
            ],
            update_interval: PRICE_UPDATE_INTERVAL,
        },
        default_rpc_url,
    }
    .into()
}

fn v3_only(
    chain_id: u64,
    name: &'static str,
    stablecoin: Address,
    oracle: Address,
    start_block: u64,
    default_rpc_url: &'static str,
) -> ChainConstants {
    ChainSeed {
        chain_id,
        name,
        stablecoin,
        oracle: OracleSchedule::single(OracleVersion::V3, oracle, start_block),
        default_rpc_url,
    }
    .into()
}

fn hyperliquid() -> ChainConstants {
    ChainConstants {
        native_asset: address!("0x5555555555555555555555555555555555555555"),
        stable_pool: Some(address!("0x5Ad00c0fb20046448d924F7a674C9F25CaE8bBCb")),
        minimum_native_locked: BigDecimal::from(1),
        ..v3_only(
            645_749,
            "hyperliquid",
            address!("0xca79db4b49f608ef54a5cb813fbed3a6387bc645"),
            SHARED_V3_ORACLE,
            3_733_759,
            "https://hyperliquid.rpc.hypersync.xyz",
        )
    }
}

impl Default for ChainTable {
    fn default() -> Self {
        Self::new([
            optimism(),
            base(),
            v2_then_v3(
                1135,
                "lisk",
                address!("0xF242275d3a6527d877f2c927a82D9b057609cc71"),
                8_457_278,
                address!("0x024503003fFE9AF285f47c1DaAaA497D9f1166D0"),
                8_380_726,
                "https://lisk.drpc.org",
            ),
            v2_then_v3(
                34443,
                "mode",
                address!("0xd988097fb8612cc24eeC14542bC03424c656005f"),
                15_738_649,
                address!("0xbAEe949B52cb503e39f1Df54Dcee778da59E11bc"),
                15_591_759,
                "https://mainnet.mode.network",
            ),
            ChainConstants {
                native_asset: address!("0xFC00000000000000000000000000000000000006"),
                ..v2_then_v3(
                    252,
                    "fraxtal",
                    address!("0xFc00000000000000000000000000000000000001"),
                    12_710_720,
                    address!("0x4817f8D70aE32Ee96e5E6BFA24eb7Fcfa83bbf29"),
                    12_640_176,
                    "https://fraxtal.drpc.org",
                )
            },
            v3_only(
                42220,
                "celo",
                address!("0x37f750B7cC259A2f741AF45294f6a16572CF5cAd"),
                SHARED_V3_ORACLE,
                31_278_773,
                "https://forno.celo.org",
            ),
            v3_only(
                1868,
                "soneium",
                address!("0xbA9986D2381edf1DA03B0B9c1f8b00dc4AacC369"),
                SHARED_V3_ORACLE,
                1_863_998,
                "https://rpc.soneium.com",
            ),
            v3_only(
                130,
                "unichain",
                address!("0x078D782b760474a361dDA0AF3839290b0EF57AD6"),
                SHARED_V3_ORACLE,
                9_415_475,
                "https://mainnet.unichain.org",
            ),
            v3_only(
                57073,
                "ink",
                address!("0xF1815bd50389c46847f0Bda824eC8da914045D14"),
                SHARED_V3_ORACLE,
                3_361_885,
                "https://rpc-gel.inkonchain.com",
            ),
            v3_only(
                1750,
                "metal",
                address!("0xb91CFCcA485C6E40E3bC622f9BFA02a8ACdEeBab"),
                address!("0x3e71CCdf495d9628D3655A600Bcad3afF2ddea98"),
                11_438_647,
                "https://rpc.metall2.com",
            ),
            // Swell has no USDC, USDe stands in as the reference stablecoin
            v3_only(
                1923,
                "swell",
                address!("0x5d3a1Ff2b6BAb83b63cd9AD0787074081a52ef34"),
                SHARED_V3_ORACLE,
                3_733_759,
                "https://rpc.ankr.com/swell",
            ),
            hyperliquid(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimism_oracle_version_selection() {
        let table = ChainTable::default();
        assert_eq!(table.select_oracle_version(10, 124_076_661).unwrap(), OracleVersion::V1);
        assert_eq!(table.select_oracle_version(10, 124_076_662).unwrap(), OracleVersion::V2);
        assert_eq!(table.select_oracle_version(10, 125_484_891).unwrap(), OracleVersion::V2);
        assert_eq!(table.select_oracle_version(10, 125_484_892).unwrap(), OracleVersion::V3);
    }

    #[test]
    fn test_v3_only_chain_uses_v3_from_genesis() {
        let table = ChainTable::default();
        assert_eq!(table.select_oracle_version(42220, 0).unwrap(), OracleVersion::V3);
        assert_eq!(
            table.oracle_address(42220, OracleVersion::V3).unwrap(),
            SHARED_V3_ORACLE
        );
        assert!(table.oracle_address(42220, OracleVersion::V1).is_err());
    }

    #[test]
    fn test_oracle_addresses() {
        let table = ChainTable::default();
        assert_eq!(
            table.oracle_address(10, OracleVersion::V3).unwrap(),
            address!("0x59114D308C6DE4A84F5F8cD80485a5481047b99f")
        );
        assert_eq!(
            table.oracle_address(34443, OracleVersion::V2).unwrap(),
            SHARED_V2_ORACLE
        );
    }

    #[test]
    fn test_unknown_chain_is_fatal() {
        let table = ChainTable::default();
        let err = table.get(1).unwrap_err();
        assert!(err.to_string().contains("Unsupported chain id"));
    }

    #[test]
    fn test_all_chains_configured() {
        let table = ChainTable::default();
        assert_eq!(
            table.chain_ids(),
            vec![10, 130, 252, 1135, 1750, 1868, 1923, 8453, 34443, 42220, 57073, 645_749]
        );
    }

    #[test]
    fn test_optimism_reward_token_switch() {
        let chain = ChainTable::default().get(10).unwrap().clone();
        assert_eq!(
            chain.reward_token(105_896_879),
            address!("0x3c8B650257cFb5f272f799F5e2b4e65093a11a05")
        );
        assert_eq!(
            chain.reward_token(105_896_880),
            address!("0x9560e827aF36c94D2Ac33a39bCE1Fe78631088Db")
        );
    }

    #[test]
    fn test_connectors_filtered_by_created_block() {
        let mut chain = ChainTable::default().get(8453).unwrap().clone();
        let early = address!("0x1111111111111111111111111111111111111111");
        let late = address!("0x2222222222222222222222222222222222222222");
        chain.price_connectors = vec![
            PriceConnector { address: early, created_block: 100 },
            PriceConnector { address: late, created_block: 200 },
        ];
        assert_eq!(chain.connectors_at(99), Vec::<Address>::new());
        assert_eq!(chain.connectors_at(150), vec![early]);
        assert_eq!(chain.connectors_at(200), vec![early, late]);
    }

    #[test]
    fn test_connectors_file_override() {
        let dir = std::env::temp_dir().join("pool-indexer-connectors-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("connectors.json");
        std::fs::write(
            &path,
            r#"{"10":[{"address":"0x1111111111111111111111111111111111111111","createdBlock":5}]}"#,
        )
        .unwrap();

        let table = ChainTable::default().with_connectors_file(&path).unwrap();
        assert_eq!(table.get(10).unwrap().price_connectors.len(), 1);
        assert_eq!(table.get(10).unwrap().price_connectors[0].created_block, 5);
        // Chains missing from the file keep their built-in list
        assert_eq!(table.get(8453).unwrap().price_connectors.len(), 3);
    }

    #[test]
    fn test_builtin_connectors() {
        let table = ChainTable::default();
        let optimism = table.get(10).unwrap();
        let connectors = optimism.connectors_at(optimism.oracle.start_block);
        assert_eq!(connectors.len(), 6);
        assert_eq!(connectors[0], address!("0x4200000000000000000000000000000000000042"));
        assert!(!connectors.contains(&optimism.native_asset));
        assert!(!connectors.contains(&optimism.stablecoin));

        let base = table.get(8453).unwrap();
        assert_eq!(
            base.connectors_at(base.oracle.start_block),
            vec![
                address!("0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA"),
                address!("0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb"),
                address!("0x2Ae3F1Ec7F1F5012CFEab0185bfc7aa3cf0DEc22"),
            ]
        );
        assert!(table.get(34_443).unwrap().price_connectors.is_empty());
    }

    #[test]
    fn test_hyperliquid_overrides() {
        let chain = ChainTable::default().get(645_749).unwrap().clone();
        assert_eq!(chain.minimum_native_locked, BigDecimal::from(1));
        assert!(chain.stable_pool.is_some());
        assert!(!chain.has_oracle_at(3_733_758));
        assert!(chain.has_oracle_at(3_733_759));
    }
}
