pub mod alpha_vantage;
pub mod coingecko;

pub use alpha_vantage::AlphaVantagePriceSource;
pub use coingecko::CoinGeckoPriceSource;
