pub mod bundle;
pub mod factory;
pub mod pool;
pub mod token;

pub use bundle::Bundle;
pub use factory::Factory;
pub use pool::{LiquidityPoolAggregator, LiquidityPoolSnapshot, PoolDiff, PoolKind};
pub use token::{Token, TokenId};
