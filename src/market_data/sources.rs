use std::collections::BTreeSet;

use tracing::{info, warn};

use super::{CoinCatalog, PriceMap};

#[async_trait::async_trait]
pub trait CryptoPriceSource: Send + Sync {
    /// Price every resolvable symbol in one batch. The catalog is run-scoped.
    async fn fetch_prices(&self, symbols: &BTreeSet<String>, catalog: &CoinCatalog) -> PriceMap;

    fn name(&self) -> &str;
}

/// Result of a single equity lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Price(f64),
    /// No usable price for this symbol; other lookups may continue.
    Unavailable,
    /// The provider signalled its request quota; carries the provider's message.
    RateLimited(String),
}

#[async_trait::async_trait]
pub trait EquityPriceSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> QuoteOutcome;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquityLookupPolicy {
    /// Priced at 1.00 without a lookup.
    pub cash_symbol: String,
    pub stop_on_rate_limit: bool,
}

impl Default for EquityLookupPolicy {
    fn default() -> Self {
        Self {
            cash_symbol: "USD".to_string(),
            stop_on_rate_limit: true,
        }
    }
}

/// Look up each equity symbol in turn.
///
/// The cash symbol is always present at 1.00. Once the provider reports a
/// rate limit, remaining symbols are skipped if the policy says so.
pub async fn fetch_equity_prices(
    source: &dyn EquityPriceSource,
    symbols: &BTreeSet<String>,
    policy: &EquityLookupPolicy,
) -> PriceMap {
    let mut prices = PriceMap::new();
    prices.insert(policy.cash_symbol.clone(), 1.00);

    let mut rate_limited = false;
    for symbol in symbols {
        if *symbol == policy.cash_symbol {
            continue;
        }
        if rate_limited && policy.stop_on_rate_limit {
            info!(symbol = %symbol, source = source.name(), "skipping lookup after rate limit");
            continue;
        }

        match source.fetch_quote(symbol).await {
            QuoteOutcome::Price(price) => {
                info!(symbol = %symbol, price, "fetched stock price");
                prices.insert(symbol.clone(), price);
            }
            QuoteOutcome::Unavailable => {
                warn!(symbol = %symbol, source = source.name(), "no price available");
            }
            QuoteOutcome::RateLimited(message) => {
                warn!(
                    symbol = %symbol,
                    source = source.name(),
                    %message,
                    "provider rate limit reached"
                );
                rate_limited = true;
            }
        }
    }

    prices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedSource {
        outcomes: HashMap<&'static str, QuoteOutcome>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(outcomes: impl IntoIterator<Item = (&'static str, QuoteOutcome)>) -> Self {
            Self {
                outcomes: outcomes.into_iter().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl EquityPriceSource for ScriptedSource {
        async fn fetch_quote(&self, symbol: &str) -> QuoteOutcome {
            self.calls.lock().unwrap().push(symbol.to_string());
            self.outcomes
                .get(symbol)
                .cloned()
                .unwrap_or(QuoteOutcome::Unavailable)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn symbols(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn cash_symbol_priced_without_lookup() {
        let source = ScriptedSource::new(Vec::new());
        let prices =
            fetch_equity_prices(&source, &symbols(&["USD"]), &EquityLookupPolicy::default()).await;

        assert_eq!(prices.get("USD"), Some(&1.0));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn unavailable_symbol_does_not_stop_others() {
        let source = ScriptedSource::new([
            ("AAPL", QuoteOutcome::Unavailable),
            ("MSFT", QuoteOutcome::Price(410.5)),
        ]);
        let prices = fetch_equity_prices(
            &source,
            &symbols(&["AAPL", "MSFT"]),
            &EquityLookupPolicy::default(),
        )
        .await;

        assert_eq!(prices.get("MSFT"), Some(&410.5));
        assert!(!prices.contains_key("AAPL"));
        assert_eq!(source.calls(), vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn rate_limit_stops_remaining_lookups() {
        let source = ScriptedSource::new([
            ("AAPL", QuoteOutcome::RateLimited("quota".to_string())),
            ("MSFT", QuoteOutcome::Price(410.5)),
        ]);
        let prices = fetch_equity_prices(
            &source,
            &symbols(&["AAPL", "MSFT"]),
            &EquityLookupPolicy::default(),
        )
        .await;

        assert_eq!(source.calls(), vec!["AAPL"]);
        assert_eq!(prices.len(), 1);
    }

    #[tokio::test]
    async fn rate_limit_can_be_ignored() {
        let source = ScriptedSource::new([
            ("AAPL", QuoteOutcome::RateLimited("quota".to_string())),
            ("MSFT", QuoteOutcome::Price(410.5)),
        ]);
        let policy = EquityLookupPolicy {
            stop_on_rate_limit: false,
            ..EquityLookupPolicy::default()
        };
        let prices = fetch_equity_prices(&source, &symbols(&["AAPL", "MSFT"]), &policy).await;

        assert_eq!(source.calls(), vec!["AAPL", "MSFT"]);
        assert_eq!(prices.get("MSFT"), Some(&410.5));
    }
}
