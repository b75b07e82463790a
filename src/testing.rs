//! In-memory providers for unit tests.

use crate::client::Client;
use crate::core::currency::{RateObservation, RateProvider, RateTable};
use crate::core::error::{Error, Result};
use crate::core::indicator::{
    Country, IdValue, IndicatorDataPoint, IndicatorMeta, IndicatorProvider, Region,
};
use crate::core::validation::current_year;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct MockIndicatorProvider {
    series: HashMap<String, Vec<IndicatorDataPoint>>,
    delays: HashMap<String, Duration>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl MockIndicatorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single observation from last year.
    pub fn with_factor(self, country: &str, name: &str, factor: f64) -> Self {
        self.with_series(country, name, &[(1, Some(factor))])
    }

    /// Points given as `(years before now, value)`, newest first.
    pub fn with_series(mut self, country: &str, name: &str, points: &[(i32, Option<f64>)]) -> Self {
        let now = current_year();
        let series = points
            .iter()
            .map(|(years_ago, value)| IndicatorDataPoint {
                indicator: IdValue {
                    id: "PA.NUS.PPP".to_string(),
                    value: "PPP conversion factor".to_string(),
                },
                country: IdValue {
                    id: country.to_string(),
                    value: name.to_string(),
                },
                country_iso3: String::new(),
                date: (now - years_ago).to_string(),
                value: *value,
                unit: String::new(),
                obs_status: String::new(),
                decimal: 0,
            })
            .collect();
        self.series.insert(country.to_string(), series);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_country_delay(mut self, country: &str, delay: Duration) -> Self {
        self.delays.insert(country.to_string(), delay);
        self
    }
}

#[async_trait]
impl IndicatorProvider for MockIndicatorProvider {
    async fn fetch_indicator(
        &self,
        country: &str,
        _indicator: &str,
        start_year: i32,
        end_year: i32,
        _per_page: u32,
    ) -> Result<Vec<IndicatorDataPoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(country).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }

        let series = self
            .series
            .get(country)
            .ok_or_else(|| Error::api("unknown country").with_context("country_code", country))?;
        Ok(series
            .iter()
            .filter(|p| p.year().is_some_and(|y| (start_year..=end_year).contains(&y)))
            .cloned()
            .collect())
    }

    async fn fetch_countries(&self) -> Result<Vec<Country>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let country = |iso2: &str, name: &str, capital: &str| Country {
            id: String::new(),
            iso2_code: iso2.to_string(),
            name: name.to_string(),
            region: Region::default(),
            admin_region: Region::default(),
            income_level: Region::default(),
            lending_type: Region::default(),
            capital_city: capital.to_string(),
            longitude: String::new(),
            latitude: String::new(),
        };
        Ok(vec![
            country("TR", "Turkiye", "Ankara"),
            country("IN", "India", "New Delhi"),
            country("NE", "Niger", "Niamey"),
            country("NG", "Nigeria", "Abuja"),
            country("DE", "Germany", "Berlin"),
        ])
    }

    async fn search_indicators(&self, query: &str) -> Result<Vec<IndicatorMeta>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![IndicatorMeta {
            id: "PA.NUS.PPP".to_string(),
            name: format!("{query} conversion factor"),
            unit: String::new(),
            source: IdValue::default(),
            source_note: String::new(),
            source_organization: String::new(),
            topics: Vec::new(),
        }])
    }
}

#[derive(Default)]
pub struct MockRateProvider {
    rates: BTreeMap<(String, String), f64>,
    pub calls: AtomicUsize,
}

impl MockRateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, base: &str, quote: &str, rate: f64) -> Self {
        self.rates.insert((base.to_string(), quote.to_string()), rate);
        self
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap_or_default()
    }
}

#[async_trait]
impl RateProvider for MockRateProvider {
    async fn fetch_rate(&self, base: &str, quote: &str) -> Result<RateObservation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rate = self
            .rates
            .get(&(base.to_string(), quote.to_string()))
            .copied()
            .ok_or_else(|| Error::api(format!("no exchange rate found for {base} to {quote}")))?;
        Ok(RateObservation {
            base: base.to_string(),
            quote: quote.to_string(),
            rate,
            as_of: Self::as_of(),
        })
    }

    async fn fetch_rates(&self, base: &str) -> Result<RateTable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RateTable {
            base: base.to_string(),
            as_of: Self::as_of(),
            rates: self
                .rates
                .iter()
                .filter(|((b, _), _)| b == base)
                .map(|((_, q), r)| (q.clone(), *r))
                .collect(),
        })
    }
}

/// A cached client over the given doubles.
pub fn test_client(indicators: MockIndicatorProvider, rates: MockRateProvider) -> Client {
    Client::builder()
        .indicator_provider(Arc::new(indicators))
        .rate_provider(Arc::new(rates))
        .build()
        .unwrap()
}
