//! Price lookups for held assets.
//!
//! Crypto prices come from one batched call per run; equities are looked up
//! one symbol at a time. Every path returns a [`PriceMap`] and never fails:
//! anything that cannot be priced is simply absent from the map.

pub mod providers;
mod sources;
mod symbols;

pub use sources::{
    fetch_equity_prices, CryptoPriceSource, EquityLookupPolicy, EquityPriceSource, QuoteOutcome,
};
pub use symbols::{CatalogEntry, CoinCatalog, SymbolResolver};

use std::collections::BTreeMap;

/// Uppercase symbol -> current price in the quote currency.
pub type PriceMap = BTreeMap<String, f64>;
