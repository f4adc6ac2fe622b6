//! CoinGecko crypto price provider.
//!
//! Uses two public endpoints: `/coins/list` for the symbol catalog (fetched
//! once per run) and `/simple/price` to price every resolved coin in a single
//! batched call.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, Context, Result};
use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};

use crate::http::{HttpClient, Request};
use crate::market_data::{CatalogEntry, CoinCatalog, CryptoPriceSource, PriceMap, SymbolResolver};

const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

pub struct CoinGeckoPriceSource {
    http: HttpClient,
    base_url: String,
    /// Quote currency for prices (e.g. "usd")
    quote_currency: String,
    resolver: SymbolResolver,
}

impl CoinGeckoPriceSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: COINGECKO_API_BASE.to_string(),
            quote_currency: "usd".to_string(),
            resolver: SymbolResolver::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_quote_currency(mut self, currency: impl Into<String>) -> Self {
        self.quote_currency = currency.into().to_lowercase();
        self
    }

    pub fn with_resolver(mut self, resolver: SymbolResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Download the full symbol catalog.
    pub async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let url = format!("{}/coins/list", self.base_url);
        info!("retrieving CoinGecko coin catalog");

        let body = self
            .http
            .send(Request::new(&Method::GET, &url))
            .await?
            .ok_or_else(|| anyhow!("CoinGecko coin catalog response was empty"))?;

        serde_json::from_value(body).context("Failed to parse CoinGecko coin catalog")
    }

    /// One `/simple/price` call for all ids. Returns `None` if the call failed.
    async fn fetch_simple_prices(&self, ids: &BTreeSet<&str>) -> Option<Value> {
        let url = format!("{}/simple/price", self.base_url);
        let ids = ids.iter().copied().collect::<Vec<_>>().join(",");
        let query = [
            ("ids", ids.as_str()),
            ("vs_currencies", self.quote_currency.as_str()),
        ];

        self.http
            .request_json(Request::new(&Method::GET, &url).query(&query))
            .await
    }

    /// Pick the quote-currency price for each resolved symbol out of a
    /// `/simple/price` body shaped like `{"bitcoin": {"usd": 42000.0}}`.
    fn extract_prices(&self, resolved: &BTreeMap<String, String>, body: &Value) -> PriceMap {
        let mut prices = PriceMap::new();

        for (symbol, id) in resolved {
            let price = body
                .get(id.to_lowercase())
                .and_then(|quotes| quotes.get(&self.quote_currency))
                .and_then(Value::as_f64);

            match price {
                Some(price) => {
                    prices.insert(symbol.clone(), price);
                }
                None => warn!(
                    symbol = %symbol,
                    coin_id = %id,
                    currency = %self.quote_currency,
                    "price not available in response"
                ),
            }
        }

        prices
    }
}

#[async_trait::async_trait]
impl CryptoPriceSource for CoinGeckoPriceSource {
    async fn fetch_prices(&self, symbols: &BTreeSet<String>, catalog: &CoinCatalog) -> PriceMap {
        if symbols.is_empty() {
            return PriceMap::new();
        }

        let entries = match catalog.get_or_fetch(|| self.fetch_catalog()).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "failed to load CoinGecko coin catalog");
                return PriceMap::new();
            }
        };

        let resolved = self.resolver.resolve(&entries, symbols);
        for symbol in symbols.iter().filter(|s| !resolved.contains_key(*s)) {
            warn!(symbol = %symbol, "no CoinGecko id for symbol");
        }
        if resolved.is_empty() {
            return PriceMap::new();
        }

        let ids: BTreeSet<&str> = resolved.values().map(String::as_str).collect();
        info!(count = ids.len(), "retrieving prices from CoinGecko");
        let Some(body) = self.fetch_simple_prices(&ids).await else {
            warn!("failed to retrieve prices from CoinGecko");
            return PriceMap::new();
        };

        self.extract_prices(&resolved, &body)
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
