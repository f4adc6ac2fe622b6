//! Mapping held symbols onto a price provider's canonical coin ids.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tokio::sync::OnceCell;

/// One row of the provider's coin catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub symbol: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
        }
    }
}

/// Coin catalog fetched at most once per run.
///
/// Owned by the caller for the duration of a single run and dropped with it;
/// a new run starts from an empty catalog. A failed fetch is not cached.
#[derive(Debug, Default)]
pub struct CoinCatalog {
    entries: OnceCell<Arc<Vec<CatalogEntry>>>,
}

impl CoinCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.initialized()
    }

    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<Arc<Vec<CatalogEntry>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<CatalogEntry>>>,
    {
        let entries = self
            .entries
            .get_or_try_init(move || async move { fetch().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(entries))
    }
}

/// Resolves requested symbols against a catalog where many listings may
/// share one ticker.
#[derive(Debug, Clone, Default)]
pub struct SymbolResolver {
    /// Lowercase symbol -> the only id accepted for that symbol.
    overrides: BTreeMap<String, String>,
}

impl SymbolResolver {
    pub fn new(overrides: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            overrides: overrides
                .into_iter()
                .map(|(symbol, id)| (symbol.to_lowercase(), id))
                .collect(),
        }
    }

    /// Map each requested (uppercase) symbol to a canonical id.
    ///
    /// A catalog entry is accepted only if it matches the override for its
    /// symbol, when one exists; otherwise the first entry listed wins.
    /// Requested symbols with no accepted entry are left out.
    pub fn resolve(
        &self,
        catalog: &[CatalogEntry],
        requested: &BTreeSet<String>,
    ) -> BTreeMap<String, String> {
        let mut resolved = BTreeMap::new();

        for entry in catalog {
            let symbol = entry.symbol.to_uppercase();
            if !requested.contains(&symbol) {
                continue;
            }
            if let Some(required) = self.overrides.get(&entry.symbol.to_lowercase()) {
                if *required != entry.id {
                    continue;
                }
            }
            resolved.entry(symbol).or_insert_with(|| entry.id.clone());
        }

        resolved
    }
}
