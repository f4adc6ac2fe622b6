//! Alpha Vantage equity price provider.
//!
//! Uses the GLOBAL_QUOTE endpoint, one request per symbol.
//! Note: Free tier is limited to 25 requests/day.

use std::collections::BTreeMap;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::http::{HttpClient, Request};
use crate::market_data::{EquityPriceSource, QuoteOutcome};

const BASE_URL: &str = "https://www.alphavantage.co";

/// Alpha Vantage provider for latest equity quotes.
pub struct AlphaVantagePriceSource {
    http: HttpClient,
    base_url: String,
    api_key: SecretString,
    /// Held symbol -> symbol the provider lists it under.
    aliases: BTreeMap<String, String>,
}

impl AlphaVantagePriceSource {
    pub fn new(http: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
            api_key: SecretString::from(api_key.into()),
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.aliases = aliases
            .into_iter()
            .map(|(held, listed)| (held.to_uppercase(), listed))
            .collect();
        self
    }

    /// The symbol to send to the provider for a held symbol.
    fn provider_symbol(&self, symbol: &str) -> String {
        let upper = symbol.to_uppercase();
        self.aliases.get(&upper).cloned().unwrap_or(upper)
    }

    fn parse_quote(body: Option<Value>) -> QuoteOutcome {
        let Some(body) = body else {
            return QuoteOutcome::Unavailable;
        };

        let response: GlobalQuoteResponse = match serde_json::from_value(body) {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "unexpected Alpha Vantage response shape");
                return QuoteOutcome::Unavailable;
            }
        };

        if let Some(quote) = response.global_quote {
            return match quote.price.as_deref().map(str::trim) {
                Some(raw) => match raw.parse::<f64>() {
                    Ok(price) if price.is_finite() => QuoteOutcome::Price(price),
                    _ => {
                        warn!(value = raw, "unexpected price value");
                        QuoteOutcome::Unavailable
                    }
                },
                None => QuoteOutcome::Unavailable,
            };
        }

        if let Some(message) = response.information.or(response.note) {
            return QuoteOutcome::RateLimited(message);
        }
        if let Some(message) = response.error_message {
            warn!(%message, "Alpha Vantage rejected the request");
        }
        QuoteOutcome::Unavailable
    }
}

#[async_trait::async_trait]
impl EquityPriceSource for AlphaVantagePriceSource {
    async fn fetch_quote(&self, symbol: &str) -> QuoteOutcome {
        let listed = self.provider_symbol(symbol);
        debug!(symbol, listed = %listed, "fetching stock price");

        let url = format!("{}/query", self.base_url);
        let query = [
            ("function", "GLOBAL_QUOTE"),
            ("symbol", listed.as_str()),
            ("apikey", self.api_key.expose_secret()),
        ];

        let body = self
            .http
            .request_json(Request::new(&Method::GET, &url).query(&query))
            .await;
        Self::parse_quote(body)
    }

    fn name(&self) -> &str {
        "alpha_vantage"
    }
}

/// Response from the GLOBAL_QUOTE endpoint, including its soft-error shapes.
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,

    /// Quota exhausted or premium-only notice.
    #[serde(rename = "Information")]
    information: Option<String>,

    #[serde(rename = "Note")]
    note: Option<String>,

    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
}
