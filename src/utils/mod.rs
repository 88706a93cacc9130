pub mod app_context;
pub mod constants;
pub mod logger;
pub mod math;
pub mod providers;
