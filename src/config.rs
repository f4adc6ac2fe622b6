use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::format::CurrencyFormat;
use crate::sync::MissingPricePolicy;

pub const NOTION_API_KEY: &str = "NOTION_API_KEY";
pub const ALPHA_VANTAGE_API_KEY: &str = "ALPHA_VANTAGE_API_KEY";
pub const CRYPTO_DB_ID: &str = "CRYPTO_DB_ID";
pub const STOCK_DB_ID: &str = "STOCK_DB_ID";
pub const FIAT_DB_ID: &str = "FIAT_DB_ID";
pub const TOTAL_CALLOUT_BLOCK_ID: &str = "TOTAL_CALLOUT_BLOCK_ID";

/// Slowest accepted pacing: one request per day.
pub const MIN_REQUESTS_PER_SECOND: f64 = 1.0 / 86_400.0;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Outbound request pacing for the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained ceiling. Notion documents an average of three requests per second.
    pub requests_per_second: f64,

    /// Slots granted back-to-back after the limiter has been idle.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 3.0,
            burst: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of update jobs in flight at once.
    pub workers: usize,

    /// Records without a fresh price: `"skip"` or `"keep_previous"`.
    pub missing_price: MissingPricePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            missing_price: MissingPricePolicy::Skip,
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff() -> Duration {
    Duration::from_millis(500)
}

/// Transport settings shared by every outbound client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(
        default = "default_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,

    /// Total attempts per request, including the first.
    pub max_attempts: u32,

    /// Base delay before the first retry; doubles on each further retry.
    #[serde(
        default = "default_backoff",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub backoff: Duration,

    /// Response statuses that are retried transparently.
    pub retry_statuses: Vec<u16>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_attempts: 3,
            backoff: default_backoff(),
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StocksConfig {
    /// The equity refresh only runs during this UTC hour (daily provider quota).
    pub update_hour_utc: u32,

    /// Stop issuing equity lookups once the provider signals its limit.
    pub stop_on_rate_limit: bool,

    /// Symbol held as cash; always priced at 1.00.
    pub cash_symbol: String,

    /// Symbols the provider lists under a different (exchange-suffixed) name.
    pub aliases: BTreeMap<String, String>,
}

impl Default for StocksConfig {
    fn default() -> Self {
        Self {
            update_hour_utc: 11,
            stop_on_rate_limit: true,
            cash_symbol: "USD".to_string(),
            aliases: BTreeMap::from([("CSPX".to_string(), "CSPX.LON".to_string())]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    pub quote_currency: String,

    /// Lowercase symbol -> the only catalog id accepted for it.
    pub overrides: BTreeMap<String, String>,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        let overrides = [
            ("dai", "dai"),
            ("mana", "decentraland"),
            ("eth", "ethereum"),
            ("btc", "bitcoin"),
            ("usdt", "tether"),
            ("bnb", "binancecoin"),
        ]
        .into_iter()
        .map(|(symbol, id)| (symbol.to_string(), id.to_string()))
        .collect();

        Self {
            quote_currency: "usd".to_string(),
            overrides,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub notion: String,
    pub coingecko: String,
    pub alpha_vantage: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            notion: "https://api.notion.com/v1".to_string(),
            coingecko: "https://api.coingecko.com/api/v3".to_string(),
            alpha_vantage: "https://www.alphavantage.co".to_string(),
        }
    }
}

/// Property names read and written on tracked records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyNames {
    pub crypto_symbol: String,
    pub stock_symbol: String,
    pub price: String,
    pub total: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            crypto_symbol: "Coin".to_string(),
            stock_symbol: "Stock".to_string(),
            price: "Price".to_string(),
            total: "Total".to_string(),
        }
    }
}

/// Tuning loaded from an optional TOML file. Secrets and ids never live here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rate_limit: RateLimitConfig,
    pub dispatch: DispatchConfig,
    pub http: HttpConfig,
    pub stocks: StocksConfig,
    pub crypto: CryptoConfig,
    pub endpoints: EndpointsConfig,
    pub properties: PropertyNames,
    pub display: CurrencyFormat,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rps = self.rate_limit.requests_per_second;
        if !(rps.is_finite() && rps >= MIN_REQUESTS_PER_SECOND) {
            return Err(ConfigError::Invalid {
                field: "rate_limit.requests_per_second",
                reason: format!(
                    "must be at least {MIN_REQUESTS_PER_SECOND} (one per day), got {rps}"
                ),
            });
        }
        if self.rate_limit.burst == 0 {
            return Err(ConfigError::Invalid {
                field: "rate_limit.burst",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.dispatch.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "dispatch.workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.http.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "http.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.stocks.update_hour_utc > 23 {
            return Err(ConfigError::Invalid {
                field: "stocks.update_hour_utc",
                reason: format!("must be 0-23, got {}", self.stocks.update_hour_utc),
            });
        }
        Ok(())
    }
}

/// The three tracked collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionIds {
    pub crypto: String,
    pub stock: String,
    /// Holds raw numeric totals; the other two use formula totals.
    pub fiat: String,
}

/// Credentials and identifiers supplied by the environment.
#[derive(Debug)]
pub struct EnvConfig {
    pub notion_api_key: SecretString,
    pub alpha_vantage_api_key: SecretString,
    pub collections: CollectionIds,
    pub summary_block_id: String,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Every value is required and must be non-blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Self {
            notion_api_key: SecretString::from(required(NOTION_API_KEY)?),
            alpha_vantage_api_key: SecretString::from(required(ALPHA_VANTAGE_API_KEY)?),
            collections: CollectionIds {
                crypto: required(CRYPTO_DB_ID)?,
                stock: required(STOCK_DB_ID)?,
                fiat: required(FIAT_DB_ID)?,
            },
            summary_block_id: required(TOTAL_CALLOUT_BLOCK_ID)?,
        })
    }
}
