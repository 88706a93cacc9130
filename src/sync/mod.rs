pub mod erc20;
pub mod native_price;
pub mod price_oracle;

pub use erc20::{balance_of, create_token_entity, resolve_metadata};
pub use native_price::{native_price_per_token, refresh_bundle, refresh_derived_native};
pub use price_oracle::{read_prices, refresh_price};
