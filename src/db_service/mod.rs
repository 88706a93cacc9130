mod entity_store;
mod factory_service;

pub use entity_store::{entity_key, EntityStore, MemoryStore};
pub use factory_service::{FactoryActivity, FactoryService};
