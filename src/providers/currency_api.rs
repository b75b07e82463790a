use super::util::{check_status, with_retry};
use crate::core::currency::{RateObservation, RateProvider, RateTable};
use crate::core::error::{Error, ErrorCode, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

const USER_AGENT: &str = "ppp-price/0.1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the fawazahmed0 currency-api layout:
/// `GET {base}/currencies/{code}.json` → `{"date": ..., "{code}": {quote: rate}}`.
pub struct CurrencyApiProvider {
    base_url: String,
    client: reqwest::Client,
}

impl CurrencyApiProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// `timeout` bounds each HTTP attempt; every retry gets a fresh one.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(CurrencyApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn fetch_table(&self, base: &str) -> Result<(NaiveDate, Map<String, Value>)> {
        let base = base.to_lowercase();
        let url = format!("{}/currencies/{}.json", self.base_url, base);
        debug!("Requesting currency rates from {}", url);

        let response = with_retry(|| self.client.get(&url).send(), 3, 500).await?;
        let response = check_status(response, &url).await?;
        let text = response.text().await?;

        let mut data: Map<String, Value> = serde_json::from_str(&text).map_err(|e| {
            Error::wrap(ErrorCode::ApiError, "failed to parse response", e)
                .with_context("currency", &base)
        })?;

        let as_of = data
            .get("date")
            .and_then(Value::as_str)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or_else(|| Utc::now().date_naive());

        match data.remove(&base) {
            Some(Value::Object(rates)) => Ok((as_of, rates)),
            _ => Err(Error::api(format!("no rates found for currency {base}"))
                .with_context("currency", base.to_uppercase())),
        }
    }
}

#[async_trait]
impl RateProvider for CurrencyApiProvider {
    #[instrument(name = "CurrencyRateFetch", skip(self), fields(base = %base, quote = %quote))]
    async fn fetch_rate(&self, base: &str, quote: &str) -> Result<RateObservation> {
        let (as_of, rates) = self.fetch_table(base).await?;

        let rate = rates
            .get(&quote.to_lowercase())
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                Error::api(format!(
                    "no exchange rate found for {} to {}",
                    base.to_lowercase(),
                    quote.to_lowercase()
                ))
                .with_context("from", base.to_uppercase())
                .with_context("to", quote.to_uppercase())
            })?;

        Ok(RateObservation {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
            rate,
            as_of,
        })
    }

    async fn fetch_rates(&self, base: &str) -> Result<RateTable> {
        let (as_of, rates) = self.fetch_table(base).await?;
        let rates: BTreeMap<String, f64> = rates
            .into_iter()
            .filter_map(|(code, rate)| rate.as_f64().map(|r| (code.to_uppercase(), r)))
            .collect();

        Ok(RateTable {
            base: base.to_uppercase(),
            as_of,
            rates,
        })
    }
}
