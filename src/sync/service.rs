use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use super::aggregate::{calculate_total, publish_total, TotalField, TotalSource};
use super::{
    unique_symbols, AssetKind, DispatchSummary, Dispatcher, MissingPricePolicy, RateLimiter,
    UpdateJobBuilder,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{CollectionIds, Config, EnvConfig, PropertyNames};
use crate::format::CurrencyFormat;
use crate::http::HttpClient;
use crate::market_data::providers::{AlphaVantagePriceSource, CoinGeckoPriceSource};
use crate::market_data::{
    fetch_equity_prices, CoinCatalog, CryptoPriceSource, EquityLookupPolicy, EquityPriceSource,
    PriceMap, SymbolResolver,
};
use crate::store::{query_all, DocumentStore, NotionStore, Record};
use secrecy::ExposeSecret;

/// When the equity refresh runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockSchedule {
    /// Only when the current UTC hour equals this hour.
    AtUtcHour(u32),
    Always,
    Never,
}

impl StockSchedule {
    pub fn is_due(self, clock: &dyn Clock) -> bool {
        match self {
            StockSchedule::AtUtcHour(hour) => clock.utc_hour() == hour,
            StockSchedule::Always => true,
            StockSchedule::Never => false,
        }
    }
}

/// Counts for one refresh step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Distinct held symbols that needed a price lookup.
    pub symbols: usize,
    /// How many of those received a price.
    pub priced: usize,
    pub ok: usize,
    pub fail: usize,
}

impl StepReport {
    fn new(symbols: &BTreeSet<String>, prices: &PriceMap, summary: DispatchSummary) -> Self {
        Self {
            symbols: symbols.len(),
            priced: symbols.iter().filter(|s| prices.contains_key(*s)).count(),
            ok: summary.ok,
            fail: summary.fail,
        }
    }

    /// No job failed, and at least one symbol was priced if any were held.
    pub fn succeeded(&self) -> bool {
        self.fail == 0 && (self.symbols == 0 || self.priced > 0)
    }
}

/// Held equity symbols that need a provider lookup. The cash symbol is priced
/// without one, so it never counts toward a step's success.
fn lookup_symbols(symbols: &BTreeSet<String>, policy: &EquityLookupPolicy) -> BTreeSet<String> {
    symbols
        .iter()
        .filter(|symbol| **symbol != policy.cash_symbol)
        .cloned()
        .collect()
}

/// Outcome of one run, returned to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub crypto: StepReport,
    /// `None` when the equity refresh was not due.
    pub stocks: Option<StepReport>,
    /// Formatted total written to the summary block, if the recompute succeeded.
    pub total: Option<String>,
    pub status_code: u16,
}

impl RunReport {
    pub fn new(crypto: StepReport, stocks: Option<StepReport>, total: Option<String>) -> Self {
        let ok = crypto.succeeded() && stocks.map_or(true, |s| s.succeeded()) && total.is_some();
        Self {
            crypto,
            stocks,
            total,
            status_code: if ok { 200 } else { 400 },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// One scheduled refresh: crypto prices, equity prices (time-gated), then the total.
pub struct PriceSync {
    store: Arc<dyn DocumentStore>,
    crypto: Arc<dyn CryptoPriceSource>,
    equities: Arc<dyn EquityPriceSource>,
    dispatcher: Dispatcher,
    jobs: UpdateJobBuilder,
    properties: PropertyNames,
    collections: CollectionIds,
    summary_block_id: String,
    equity_policy: EquityLookupPolicy,
    schedule: StockSchedule,
    display: CurrencyFormat,
    clock: Arc<dyn Clock>,
}

impl PriceSync {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        crypto: Arc<dyn CryptoPriceSource>,
        equities: Arc<dyn EquityPriceSource>,
        limiter: Arc<RateLimiter>,
        collections: CollectionIds,
        summary_block_id: impl Into<String>,
    ) -> Self {
        let properties = PropertyNames::default();
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&store), limiter),
            store,
            crypto,
            equities,
            jobs: UpdateJobBuilder::new(properties.clone()),
            properties,
            collections,
            summary_block_id: summary_block_id.into(),
            equity_policy: EquityLookupPolicy::default(),
            schedule: StockSchedule::AtUtcHour(11),
            display: CurrencyFormat::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Wire the Notion store and both price providers from configuration.
    pub fn from_config(config: &Config, env: &EnvConfig) -> Result<Self> {
        config.validate()?;

        let http = HttpClient::from_config(&config.http)?;
        let store: Arc<dyn DocumentStore> = Arc::new(
            NotionStore::new(http.clone(), &env.notion_api_key)?
                .with_base_url(&config.endpoints.notion),
        );
        let crypto = CoinGeckoPriceSource::new(http.clone())
            .with_base_url(&config.endpoints.coingecko)
            .with_quote_currency(&config.crypto.quote_currency)
            .with_resolver(SymbolResolver::new(config.crypto.overrides.clone()));
        let equities =
            AlphaVantagePriceSource::new(http, env.alpha_vantage_api_key.expose_secret())
                .with_base_url(&config.endpoints.alpha_vantage)
                .with_aliases(config.stocks.aliases.clone());
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit)?);

        Ok(Self::new(
            store,
            Arc::new(crypto),
            Arc::new(equities),
            limiter,
            env.collections.clone(),
            env.summary_block_id.clone(),
        )
        .with_workers(config.dispatch.workers)
        .with_properties(config.properties.clone())
        .with_missing_price_policy(config.dispatch.missing_price)
        .with_equity_policy(EquityLookupPolicy {
            cash_symbol: config.stocks.cash_symbol.to_uppercase(),
            stop_on_rate_limit: config.stocks.stop_on_rate_limit,
        })
        .with_schedule(StockSchedule::AtUtcHour(config.stocks.update_hour_utc))
        .with_display(config.display.clone()))
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.dispatcher = self.dispatcher.with_workers(workers);
        self
    }

    pub fn with_properties(mut self, properties: PropertyNames) -> Self {
        self.jobs = UpdateJobBuilder::new(properties.clone()).with_policy(self.jobs.policy());
        self.properties = properties;
        self
    }

    pub fn with_missing_price_policy(mut self, policy: MissingPricePolicy) -> Self {
        self.jobs = self.jobs.with_policy(policy);
        self
    }

    pub fn with_equity_policy(mut self, policy: EquityLookupPolicy) -> Self {
        self.equity_policy = policy;
        self
    }

    pub fn with_schedule(mut self, schedule: StockSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_display(mut self, display: CurrencyFormat) -> Self {
        self.display = display;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Execute one full run.
    ///
    /// Returns an error only if a tracked collection cannot be read at all.
    /// Everything else is reflected in the report.
    pub async fn run(&self) -> Result<RunReport> {
        // Lives exactly as long as this run.
        let catalog = CoinCatalog::new();

        info!("refreshing crypto prices");
        let crypto = self.refresh_crypto(&catalog).await?;

        let stocks = if self.schedule.is_due(self.clock.as_ref()) {
            info!("refreshing stock prices");
            Some(self.refresh_stocks().await?)
        } else {
            info!("skipping stock price updates");
            None
        };

        let total = match self.recompute_total().await {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "total recompute failed");
                None
            }
        };

        let report = RunReport::new(crypto, stocks, total);
        info!(status = report.status_code, "run finished");
        Ok(report)
    }

    async fn load(
        &self,
        kind: AssetKind,
        collection_id: &str,
    ) -> Result<(Vec<Record>, BTreeSet<String>)> {
        let records = query_all(self.store.as_ref(), collection_id)
            .await
            .with_context(|| format!("Failed to query {kind:?} collection {collection_id}"))?;
        let symbols = unique_symbols(&records, kind, &self.properties);
        info!(
            kind = ?kind,
            records = records.len(),
            symbols = symbols.len(),
            "collection loaded"
        );
        Ok((records, symbols))
    }

    async fn apply(
        &self,
        kind: AssetKind,
        records: &[Record],
        prices: &PriceMap,
    ) -> DispatchSummary {
        let jobs = self
            .jobs
            .build(kind, records, prices, |id| self.store.record_url(id));
        self.dispatcher.dispatch(jobs).await
    }

    async fn refresh_crypto(&self, catalog: &CoinCatalog) -> Result<StepReport> {
        let (records, symbols) = self.load(AssetKind::Crypto, &self.collections.crypto).await?;
        let prices = self.crypto.fetch_prices(&symbols, catalog).await;

        let summary = if prices.is_empty() {
            warn!("no crypto prices available; skipping updates");
            DispatchSummary::default()
        } else {
            self.apply(AssetKind::Crypto, &records, &prices).await
        };

        Ok(StepReport::new(&symbols, &prices, summary))
    }

    async fn refresh_stocks(&self) -> Result<StepReport> {
        let (records, symbols) = self.load(AssetKind::Stock, &self.collections.stock).await?;
        let prices =
            fetch_equity_prices(self.equities.as_ref(), &symbols, &self.equity_policy).await;
        let summary = self.apply(AssetKind::Stock, &records, &prices).await;

        let looked_up = lookup_symbols(&symbols, &self.equity_policy);
        Ok(StepReport::new(&looked_up, &prices, summary))
    }

    async fn recompute_total(&self) -> Result<String> {
        let sources = [
            TotalSource::new(&self.collections.crypto, TotalField::Formula),
            TotalSource::new(&self.collections.stock, TotalField::Formula),
            TotalSource::new(&self.collections.fiat, TotalField::Number),
        ];

        let store = self.store.as_ref();
        let total = calculate_total(store, &sources, &self.properties.total, &self.display).await?;
        publish_total(store, &self.summary_block_id, total, &self.display).await?;
        Ok(self.display.format(total))
    }
}
