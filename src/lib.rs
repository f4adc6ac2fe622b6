pub mod clock;
pub mod config;
pub mod duration;
pub mod format;
pub mod http;
pub mod market_data;
pub mod store;
pub mod sync;
