use super::util::{check_status, with_retry};
use crate::core::error::{Error, ErrorCode, Result};
use crate::core::indicator::{Country, IndicatorDataPoint, IndicatorMeta, IndicatorProvider};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const USER_AGENT: &str = "ppp-price/0.1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WorldBankProvider {
    base_url: String,
    client: reqwest::Client,
}

impl WorldBankProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// `timeout` bounds each HTTP attempt; every retry gets a fresh one.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(WorldBankProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        Url::parse_with_params(&format!("{}{}", self.base_url, path), params)
            .map_err(|e| Error::wrap(ErrorCode::ApiError, "invalid request URL", e))
    }

    /// Fetches a `[metadata, records]` envelope and decodes the records.
    async fn fetch_envelope<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        debug!("Requesting World Bank data from {}", url);

        let response = with_retry(|| self.client.get(url.clone()).send(), 3, 1000).await?;
        let response = check_status(response, url.as_str()).await?;
        let text = response.text().await?;

        let envelope: Vec<Value> = serde_json::from_str(&text)
            .map_err(|e| Error::wrap(ErrorCode::ApiError, "failed to parse response", e))?;
        let mut envelope = envelope.into_iter();
        let (Some(_metadata), Some(records)) = (envelope.next(), envelope.next()) else {
            return Err(Error::api("invalid response format").with_context("url", &url));
        };
        if records.is_null() {
            return Ok(Vec::new());
        }

        serde_json::from_value(records)
            .map_err(|e| Error::wrap(ErrorCode::ApiError, "failed to parse data points", e))
    }
}

#[async_trait]
impl IndicatorProvider for WorldBankProvider {
    #[instrument(name = "WorldBankIndicatorFetch", skip(self), fields(country = %country, indicator = %indicator))]
    async fn fetch_indicator(
        &self,
        country: &str,
        indicator: &str,
        start_year: i32,
        end_year: i32,
        per_page: u32,
    ) -> Result<Vec<IndicatorDataPoint>> {
        let url = self.url(
            &format!("/country/{country}/indicator/{indicator}"),
            &[
                ("format", "json".to_string()),
                ("date", format!("{start_year}:{end_year}")),
                ("per_page", per_page.to_string()),
            ],
        )?;
        self.fetch_envelope(url).await.map_err(|e| {
            e.with_context("country_code", country)
                .with_context("indicator", indicator)
        })
    }

    #[instrument(name = "WorldBankCountriesFetch", skip(self))]
    async fn fetch_countries(&self) -> Result<Vec<Country>> {
        let url = self.url(
            "/country",
            &[
                ("format", "json".to_string()),
                ("per_page", "300".to_string()),
            ],
        )?;
        let countries: Vec<Country> = self.fetch_envelope(url).await?;
        let total = countries.len();
        let countries: Vec<Country> = countries.into_iter().filter(Country::is_sovereign).collect();
        debug!("Kept {} of {} country records", countries.len(), total);
        Ok(countries)
    }

    #[instrument(name = "WorldBankIndicatorSearch", skip(self))]
    async fn search_indicators(&self, query: &str) -> Result<Vec<IndicatorMeta>> {
        let url = self.url(
            "/indicator",
            &[
                ("format", "json".to_string()),
                ("per_page", "100".to_string()),
                // World Development Indicators
                ("source", "2".to_string()),
                ("search", query.to_string()),
            ],
        )?;
        self.fetch_envelope(url)
            .await
            .map_err(|e| e.with_context("search", query))
    }
}
