//! The orchestrator: provider adapters behind a cache-aside policy.

use crate::core::cache::Cache;
use crate::core::config::{ClientConfig, ReferencePoint};
use crate::core::currency::{RateObservation, RateProvider, RateTable, currency_for_country};
use crate::core::error::{Error, Result};
use crate::core::indicator::{
    Country, IndicatorDataPoint, IndicatorMeta, IndicatorObservation, IndicatorProvider,
    PPP_INDICATOR,
};
use crate::core::recommendation::Recommendation;
use crate::core::validation::{
    current_year, validate_amount, validate_country_code, validate_currency_code,
    validate_year_range,
};
use crate::providers::{CurrencyApiProvider, WorldBankProvider};
use crate::store::snapshot::Snapshot;
use crate::store::{CacheKey, CachedValue, MemoryCache, SharedCache};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// How many years back `get_indicator` looks for the latest observation.
pub const LOOKBACK_YEARS: i32 = 10;

const LATEST_PAGE_SIZE: u32 = 50;
const HISTORY_PAGE_SIZE: u32 = 100;

pub struct Client {
    indicators: Arc<dyn IndicatorProvider>,
    rates: Arc<dyn RateProvider>,
    cache: Option<SharedCache>,
    config: ClientConfig,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("cache_enabled", &self.cache.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builds a [`Client`] from a [`ClientConfig`], validated once in [`build`](Self::build).
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    indicator_provider: Option<Arc<dyn IndicatorProvider>>,
    rate_provider: Option<Arc<dyn RateProvider>>,
    shared_cache: Option<SharedCache>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Enables caching with `duration` as the indicator TTL.
    pub fn cache(mut self, duration: Duration) -> Self {
        self.config.cache_enabled = true;
        self.config.cache_duration = duration;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.config.cache_enabled = false;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = Some(interval);
        self
    }

    pub fn rate_ttl(mut self, ttl: Duration) -> Self {
        self.config.rate_ttl = ttl;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn rate_timeout(mut self, timeout: Duration) -> Self {
        self.config.rate_timeout = timeout;
        self
    }

    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.config.batch_timeout = timeout;
        self
    }

    pub fn world_bank_url(mut self, url: &str) -> Self {
        self.config.providers.world_bank =
            Some(crate::core::config::WorldBankProviderConfig {
                base_url: url.to_string(),
            });
        self
    }

    pub fn currency_url(mut self, url: &str) -> Self {
        self.config.providers.currency = Some(crate::core::config::CurrencyProviderConfig {
            base_url: url.to_string(),
        });
        self
    }

    pub fn reference(mut self, reference: ReferencePoint) -> Self {
        self.config.reference = reference;
        self
    }

    /// Replaces the World Bank adapter, e.g. with a test double.
    pub fn indicator_provider(mut self, provider: Arc<dyn IndicatorProvider>) -> Self {
        self.indicator_provider = Some(provider);
        self
    }

    pub fn rate_provider(mut self, provider: Arc<dyn RateProvider>) -> Self {
        self.rate_provider = Some(provider);
        self
    }

    /// Uses `cache` instead of a fresh in-memory cache. Its own TTL and
    /// expiry apply; `cache_duration` and `cleanup_interval` are ignored.
    pub fn shared_cache(mut self, cache: SharedCache) -> Self {
        self.config.cache_enabled = true;
        self.shared_cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Client> {
        self.config.validate()?;

        let indicators = match self.indicator_provider {
            Some(provider) => provider,
            None => Arc::new(WorldBankProvider::with_timeout(
                self.config.providers.world_bank_url(),
                self.config.request_timeout,
            )?),
        };
        let rates = match self.rate_provider {
            Some(provider) => provider,
            None => Arc::new(CurrencyApiProvider::with_timeout(
                self.config.providers.currency_url(),
                self.config.rate_timeout,
            )?),
        };

        let cache = match (self.config.cache_enabled, self.shared_cache) {
            (false, _) => None,
            (true, Some(cache)) => Some(cache),
            (true, None) => {
                let cache =
                    MemoryCache::<CacheKey, CachedValue>::new(self.config.cache_duration);
                cache.spawn_janitor(self.config.effective_cleanup_interval());
                Some(Arc::new(cache) as SharedCache)
            }
        };

        debug!(
            cache_enabled = self.config.cache_enabled,
            "Built PPP client"
        );
        Ok(Client {
            indicators,
            rates,
            cache,
            config: self.config,
        })
    }
}

impl Client {
    /// A client with the default configuration.
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&SharedCache> {
        self.cache.as_ref()
    }

    /// Latest PPP conversion factor for `country`, cached.
    pub async fn get_indicator(&self, country: &str) -> Result<IndicatorObservation> {
        validate_country_code(country)?;
        self.with_deadline(self.config.request_timeout, "get_indicator", async {
            self.indicator_cached(country).await
        })
        .await
    }

    /// Exchange rate `base → quote`, cached for `rate_ttl`.
    pub async fn get_rate(&self, base: &str, quote: &str) -> Result<RateObservation> {
        validate_currency_code(base)?;
        validate_currency_code(quote)?;
        self.with_deadline(self.config.rate_timeout, "get_rate", async {
            self.rate_cached(base, quote).await
        })
        .await
    }

    /// Prices `amount` (in `from_currency`) for buyers in `to_country`.
    #[instrument(skip(self))]
    pub async fn recommend(
        &self,
        amount: f64,
        from_currency: &str,
        to_country: &str,
    ) -> Result<Recommendation> {
        validate_amount(amount)?;
        validate_currency_code(from_currency)?;
        validate_country_code(to_country)?;

        self.with_deadline(self.config.request_timeout, "recommend", async {
            let (ppp, rate) = self.inputs_for(from_currency, to_country).await?;
            Ok(compute_recommendation(amount, from_currency, &ppp, &rate))
        })
        .await
    }

    /// PPP factor and exchange rate needed to price into `to_country`.
    pub(crate) async fn inputs_for(
        &self,
        from_currency: &str,
        to_country: &str,
    ) -> Result<(IndicatorObservation, RateObservation)> {
        let ppp = self
            .indicator_cached(to_country)
            .await
            .map_err(|e| e.wrapped("failed to get PPP data"))?;

        let to_currency = currency_for_country(to_country);
        let rate = self
            .rate_cached(from_currency, to_currency)
            .await
            .map_err(|e| e.wrapped("failed to get exchange rate"))?;

        Ok((ppp, rate))
    }

    /// Every PPP observation in `start_year..=end_year`, newest first. Not cached.
    pub async fn historical_indicator(
        &self,
        country: &str,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<IndicatorObservation>> {
        validate_country_code(country)?;
        validate_year_range(start_year, end_year)?;

        self.with_deadline(self.config.request_timeout, "historical_indicator", async {
            let series = self
                .indicators
                .fetch_indicator(country, PPP_INDICATOR, start_year, end_year, HISTORY_PAGE_SIZE)
                .await
                .map_err(|e| {
                    e.wrapped("failed to fetch historical PPP data")
                        .with_context("start_year", start_year)
                        .with_context("end_year", end_year)
                })?;

            let source = self.indicators.source_name();
            Ok(series
                .iter()
                .filter_map(|point| point.to_observation(source))
                .collect())
        })
        .await
    }

    /// Raw series of any indicator. Not cached.
    pub async fn indicator_data(
        &self,
        country: &str,
        indicator: &str,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<IndicatorDataPoint>> {
        validate_country_code(country)?;
        validate_year_range(start_year, end_year)?;
        if indicator.trim().is_empty() {
            return Err(Error::invalid_input("indicator code cannot be empty"));
        }

        self.with_deadline(self.config.request_timeout, "indicator_data", async {
            self.indicators
                .fetch_indicator(country, indicator, start_year, end_year, HISTORY_PAGE_SIZE)
                .await
                .map_err(|e| e.wrapped("failed to fetch indicator data"))
        })
        .await
    }

    /// All sovereign countries the indicator provider knows, cached for `countries_ttl`.
    pub async fn countries(&self) -> Result<Vec<Country>> {
        self.with_deadline(self.config.request_timeout, "countries", async {
            let key = CacheKey::Countries;
            if let Some(CachedValue::Countries(countries)) = self.cache_get(&key).await {
                return Ok(countries);
            }

            let countries = self
                .indicators
                .fetch_countries()
                .await
                .map_err(|e| e.wrapped("failed to fetch countries"))?;
            self.cache_put(
                key,
                CachedValue::Countries(countries.clone()),
                Some(self.config.countries_ttl),
            )
            .await;
            Ok(countries)
        })
        .await
    }

    pub async fn search_indicators(&self, query: &str) -> Result<Vec<IndicatorMeta>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::invalid_input("search query cannot be empty"));
        }

        self.with_deadline(self.config.request_timeout, "search_indicators", async {
            let key = CacheKey::indicator_search(query);
            if let Some(CachedValue::IndicatorSearch(found)) = self.cache_get(&key).await {
                return Ok(found);
            }

            let found = self
                .indicators
                .search_indicators(query)
                .await
                .map_err(|e| e.wrapped("failed to search indicators"))?;
            self.cache_put(key, CachedValue::IndicatorSearch(found.clone()), None)
                .await;
            Ok(found)
        })
        .await
    }

    /// Every quote published for `base`. Not cached.
    pub async fn rates_for(&self, base: &str) -> Result<RateTable> {
        validate_currency_code(base)?;
        self.with_deadline(self.config.rate_timeout, "rates_for", async {
            self.rates
                .fetch_rates(base)
                .await
                .map_err(|e| e.wrapped(format!("failed to fetch {base} rates")))
        })
        .await
    }

    /// Currency codes the rate provider can quote against USD.
    pub async fn supported_currencies(&self) -> Result<Vec<String>> {
        let table = self.rates_for("USD").await?;
        Ok(table.rates.into_keys().collect())
    }

    pub async fn convert_amount(&self, amount: f64, from: &str, to: &str) -> Result<f64> {
        validate_amount(amount)?;
        let rate = self.get_rate(from, to).await?;
        Ok(amount * rate.rate)
    }

    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
    }

    pub async fn export_cache(&self, path: impl AsRef<Path>) -> Result<()> {
        self.enabled_cache()?.export_to_file(path.as_ref()).await
    }

    /// Loads a snapshot written by [`export_cache`](Self::export_cache).
    pub async fn import_cache(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.enabled_cache()?.import_from_file(path.as_ref()).await
    }

    fn enabled_cache(&self) -> Result<&SharedCache> {
        self.cache
            .as_ref()
            .ok_or_else(|| Error::cache("cache is disabled"))
    }

    pub(crate) async fn indicator_cached(&self, country: &str) -> Result<IndicatorObservation> {
        let key = CacheKey::indicator(country);
        if let Some(CachedValue::Indicator(ppp)) = self.cache_get(&key).await {
            return Ok(ppp);
        }

        let end_year = current_year();
        let start_year = end_year - LOOKBACK_YEARS;
        let series = self
            .indicators
            .fetch_indicator(country, PPP_INDICATOR, start_year, end_year, LATEST_PAGE_SIZE)
            .await?;

        let source = self.indicators.source_name();
        let ppp = series
            .iter()
            .find_map(|point| point.to_observation(source))
            .ok_or_else(|| {
                Error::no_data(format!("no PPP data available for country {country}"))
                    .with_context("country_code", country)
                    .with_context("start_year", start_year)
                    .with_context("end_year", end_year)
            })?;
        debug!(
            "PPP factor for {} is {} ({})",
            country, ppp.factor, ppp.year
        );

        self.cache_put(key, CachedValue::Indicator(ppp.clone()), None)
            .await;
        Ok(ppp)
    }

    pub(crate) async fn rate_cached(&self, base: &str, quote: &str) -> Result<RateObservation> {
        let key = CacheKey::rate(base, quote);
        if let Some(CachedValue::Rate(rate)) = self.cache_get(&key).await {
            return Ok(rate);
        }

        let rate = self.rates.fetch_rate(base, quote).await?;
        if !rate.rate.is_finite() || rate.rate <= 0.0 {
            return Err(Error::api("exchange rate must be positive")
                .with_context("from", base)
                .with_context("to", quote)
                .with_context("rate", rate.rate));
        }

        self.cache_put(key, CachedValue::Rate(rate.clone()), Some(self.config.rate_ttl))
            .await;
        Ok(rate)
    }

    async fn cache_get(&self, key: &CacheKey) -> Option<CachedValue> {
        match &self.cache {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    async fn cache_put(&self, key: CacheKey, value: CachedValue, ttl: Option<Duration>) {
        if let Some(cache) = &self.cache {
            debug_assert_eq!(key.namespace(), value.namespace());
            cache.put(key, value, ttl).await;
        }
    }

    /// Runs `operation`, failing with a timeout error once `limit` passes.
    /// Dropping the future cancels any request in flight.
    pub(crate) async fn with_deadline<T, F>(
        &self,
        limit: Duration,
        operation: &str,
        future: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        within(Instant::now() + limit, limit, operation, future).await
    }
}

/// Runs `future` until `deadline`. Batch operations hand the same deadline to
/// every item so that one slow item fails alone; `limit` is only reported.
pub(crate) async fn within<T, F>(
    deadline: Instant,
    limit: Duration,
    operation: &str,
    future: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout_at(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!("{operation} timed out"))
            .with_context("timeout_ms", limit.as_millis())),
    }
}

/// `recommended = amount × factor`, compared with `amount × rate`.
fn compute_recommendation(
    amount: f64,
    from_currency: &str,
    ppp: &IndicatorObservation,
    rate: &RateObservation,
) -> Recommendation {
    let recommended_amount = amount * ppp.factor;
    let market_amount = amount * rate.rate;
    let discount_percentage = (market_amount - recommended_amount) / market_amount * 100.0;

    Recommendation {
        original_amount: amount,
        original_currency: from_currency.to_string(),
        recommended_amount,
        target_currency: rate.quote.clone(),
        ppp_factor: ppp.factor,
        exchange_rate: rate.rate,
        discount_percentage,
        tier: None,
    }
}
