use std::collections::BTreeMap;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::handlers::{EventMeta, IndexedEvent, IndexerEvent};
use crate::models::{Bundle, Factory, LiquidityPoolAggregator, LiquidityPoolSnapshot, Token, TokenId};

/// Persistence seam for indexed entities. Entities are never deleted.
pub trait EntityStore: Send {
    fn get_token(&self, chain_id: u64, address: Address) -> Option<Token>;
    fn set_token(&mut self, token: Token);

    fn get_pool(&self, chain_id: u64, address: Address) -> Option<LiquidityPoolAggregator>;
    fn set_pool(&mut self, pool: LiquidityPoolAggregator);

    fn get_factory(&self, chain_id: u64, address: Address) -> Option<Factory>;
    fn set_factory(&mut self, factory: Factory);

    fn get_bundle(&self, chain_id: u64) -> Option<Bundle>;
    fn set_bundle(&mut self, bundle: Bundle);

    fn push_snapshot(&mut self, snapshot: LiquidityPoolSnapshot);

    /// Keeps the raw record of a log, keyed by [`EventMeta::event_id`]
    fn set_event(&mut self, meta: &EventMeta, event: &IndexerEvent);
}

/// Key for address-identified entities, `<chainId>_<address>`
pub fn entity_key(chain_id: u64, address: Address) -> String {
    TokenId::new(chain_id, address).to_string()
}

/// Ordered in-memory store. Serializes deterministically, so two stores built from
/// the same event log produce identical JSON.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStore {
    pub tokens: BTreeMap<String, Token>,
    pub pools: BTreeMap<String, LiquidityPoolAggregator>,
    pub factories: BTreeMap<String, Factory>,
    pub bundles: BTreeMap<u64, Bundle>,
    pub snapshots: Vec<LiquidityPoolSnapshot>,
    pub events: BTreeMap<String, IndexedEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityStore for MemoryStore {
    fn get_token(&self, chain_id: u64, address: Address) -> Option<Token> {
        self.tokens.get(&entity_key(chain_id, address)).cloned()
    }

    fn set_token(&mut self, token: Token) {
        self.tokens.insert(token.id().to_string(), token);
    }

    fn get_pool(&self, chain_id: u64, address: Address) -> Option<LiquidityPoolAggregator> {
        self.pools.get(&entity_key(chain_id, address)).cloned()
    }

    fn set_pool(&mut self, pool: LiquidityPoolAggregator) {
        self.pools.insert(entity_key(pool.chain_id, pool.address), pool);
    }

    fn get_factory(&self, chain_id: u64, address: Address) -> Option<Factory> {
        self.factories.get(&entity_key(chain_id, address)).cloned()
    }

    fn set_factory(&mut self, factory: Factory) {
        self.factories
            .insert(entity_key(factory.chain_id, factory.address), factory);
    }

    fn get_bundle(&self, chain_id: u64) -> Option<Bundle> {
        self.bundles.get(&chain_id).cloned()
    }

    fn set_bundle(&mut self, bundle: Bundle) {
        self.bundles.insert(bundle.chain_id, bundle);
    }

    fn push_snapshot(&mut self, snapshot: LiquidityPoolSnapshot) {
        self.snapshots.push(snapshot);
    }

    fn set_event(&mut self, meta: &EventMeta, event: &IndexerEvent) {
        self.events.insert(
            meta.event_id(),
            IndexedEvent {
                meta: meta.clone(),
                event: event.clone(),
            },
        );
    }
}
