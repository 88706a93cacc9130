use alloy::primitives::{Address, U256};
use bigdecimal::BigDecimal;

use super::EntityStore;
use crate::models::Factory;
use crate::utils::math::{safe_div_decimal, to_decimal};

/// What one pool event contributes to its factory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactoryActivity {
    pub volume_usd: U256,
    pub fees_usd: U256,
    /// Pool liquidity `(before, after)` in USD when the event moved it
    pub liquidity_usd: Option<(U256, U256)>,
}

pub struct FactoryService;

impl FactoryService {
    /// Get or create a factory
    ///
    /// # Arguments
    /// * `store` - Entity store
    /// * `chain_id` - Chain the factory lives on
    /// * `address` - Factory contract address
    ///
    /// # Returns
    /// The stored factory, or a new one with zeroed counters owned by the null address
    pub fn get_or_create<S: EntityStore>(store: &mut S, chain_id: u64, address: Address) -> Factory {
        if let Some(factory) = store.get_factory(chain_id, address) {
            return factory;
        }
        log::debug!(
            "db_service::factory_service: Creating factory {} on chain {}",
            address,
            chain_id
        );
        let factory = Factory::new(chain_id, address);
        store.set_factory(factory.clone());
        factory
    }

    /// Counts a newly created pool and its creation transaction.
    ///
    /// There is no deduplication, each delivered `PoolCreated` counts once.
    pub fn on_pool_created<S: EntityStore>(store: &mut S, chain_id: u64, address: Address) -> Factory {
        let mut factory = Self::get_or_create(store, chain_id, address);
        factory.pool_count += 1;
        factory.tx_count += 1;
        store.set_factory(factory.clone());
        factory
    }

    /// Folds one pool event into its factory: one more transaction, plus any
    /// volume, fees and liquidity change the event carried. Native totals use the
    /// chain's current bundle price.
    ///
    /// Returns `None`, leaving the store untouched, when the factory isn't indexed.
    pub fn record_activity<S: EntityStore>(
        store: &mut S,
        chain_id: u64,
        address: Address,
        activity: &FactoryActivity,
        native_price_usd: &BigDecimal,
    ) -> Option<Factory> {
        let Some(mut factory) = store.get_factory(chain_id, address) else {
            log::warn!(
                "db_service::factory_service: Factory {} not found on chain {}",
                address,
                chain_id
            );
            return None;
        };

        let to_native = |usd: U256| safe_div_decimal(&to_decimal(usd, 18), native_price_usd);

        factory.tx_count += 1;
        factory.total_volume_usd = factory.total_volume_usd.saturating_add(activity.volume_usd);
        factory.total_volume_native += to_native(activity.volume_usd);
        factory.total_fees_usd = factory.total_fees_usd.saturating_add(activity.fees_usd);
        factory.total_fees_native += to_native(activity.fees_usd);

        if let Some((before, after)) = activity.liquidity_usd {
            factory.total_value_locked_usd = factory
                .total_value_locked_usd
                .saturating_sub(before)
                .saturating_add(after);
            factory.total_value_locked_native = to_native(factory.total_value_locked_usd);
        }

        store.set_factory(factory.clone());
        Some(factory)
    }
}
