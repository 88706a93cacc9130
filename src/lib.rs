pub mod aggregator;
pub mod cache;
pub mod config;
pub mod db_service;
pub mod handlers;
pub mod models;
pub mod sync;
pub mod utils;

#[cfg(test)]
mod test_helpers;
