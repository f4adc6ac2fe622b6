use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::PropertyNames;
use crate::market_data::PriceMap;
use crate::store::Record;

/// Which tracked collection a batch of records belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Crypto,
    Stock,
}

impl AssetKind {
    /// Select property holding the record's symbol.
    pub fn symbol_property(self, properties: &PropertyNames) -> &str {
        match self {
            AssetKind::Crypto => &properties.crypto_symbol,
            AssetKind::Stock => &properties.stock_symbol,
        }
    }
}

/// What to do with a record whose symbol got no fresh price this run.
///
/// Neither option ever writes zero or null over a stored price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPricePolicy {
    /// Emit no job; the stored price stays as it is.
    #[default]
    Skip,
    /// Re-write the record's stored price, if it has one.
    KeepPrevious,
}

/// A single pending field patch against one record.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateJob {
    pub record_id: String,
    pub url: String,
    pub payload: Value,
    pub symbol: String,
    pub price: f64,
}

/// Distinct symbols held across records, normalized to uppercase.
pub fn unique_symbols(
    records: &[Record],
    kind: AssetKind,
    properties: &PropertyNames,
) -> BTreeSet<String> {
    let property = kind.symbol_property(properties);
    records.iter().filter_map(|r| r.symbol(property)).collect()
}

/// Turns (record, price) pairs into independent update jobs.
#[derive(Debug, Clone)]
pub struct UpdateJobBuilder {
    properties: PropertyNames,
    policy: MissingPricePolicy,
}

impl UpdateJobBuilder {
    pub fn new(properties: PropertyNames) -> Self {
        Self {
            properties,
            policy: MissingPricePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MissingPricePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MissingPricePolicy {
        self.policy
    }

    /// Build one job per record with a symbol and a price to write.
    ///
    /// `record_url` maps a record id to the URL its patch is sent to.
    pub fn build<F>(
        &self,
        kind: AssetKind,
        records: &[Record],
        prices: &PriceMap,
        record_url: F,
    ) -> Vec<UpdateJob>
    where
        F: Fn(&str) -> String,
    {
        let symbol_property = kind.symbol_property(&self.properties);
        let price_property = self.properties.price.as_str();

        records
            .iter()
            .filter_map(|record| {
                let Some(symbol) = record.symbol(symbol_property) else {
                    debug!(record_id = %record.id, "record has no symbol; skipping");
                    return None;
                };

                let price = match (prices.get(&symbol), self.policy) {
                    (Some(price), _) => *price,
                    (None, MissingPricePolicy::KeepPrevious) => record.number(price_property)?,
                    (None, MissingPricePolicy::Skip) => {
                        debug!(
                            record_id = %record.id,
                            symbol = %symbol,
                            "no fresh price; leaving record untouched"
                        );
                        return None;
                    }
                };

                Some(UpdateJob {
                    record_id: record.id.clone(),
                    url: record_url(&record.id),
                    payload: json!({ "properties": { price_property: { "number": price } } }),
                    symbol,
                    price,
                })
            })
            .collect()
    }
}
