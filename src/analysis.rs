//! Trend and cross-country views derived from PPP observations.

use crate::client::{Client, within};
use crate::core::config::ReferencePoint;
use crate::core::error::{Error, Result};
use crate::core::indicator::IndicatorObservation;
use crate::core::recommendation::{CountryRanking, Trend, TrendAnalysis};
use crate::core::validation::validate_country_code;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Percent change between oldest and newest factor beyond which a series
/// counts as moving.
pub const TREND_THRESHOLD: f64 = 10.0;

impl Client {
    /// Mean, direction and sample variance of the factors in `start_year..=end_year`.
    pub async fn trend_analysis(
        &self,
        country: &str,
        start_year: i32,
        end_year: i32,
    ) -> Result<TrendAnalysis> {
        let history = self
            .historical_indicator(country, start_year, end_year)
            .await?;
        summarize_trend(country, start_year, end_year, &history)
    }

    /// Ranks `countries` by PPP factor, lowest first.
    ///
    /// Best effort: a country that fails validation or lookup, or is still
    /// pending when `batch_timeout` runs out, is left out of the ranking
    /// instead of failing the call.
    pub async fn compare_countries<S: AsRef<str>>(
        &self,
        countries: &[S],
    ) -> Result<Vec<CountryRanking>> {
        let limit = self.config().batch_timeout;
        let deadline = Instant::now() + limit;
        let reference =
            within(deadline, limit, "compare_countries", self.reference_factor()).await?;

        let lookups = countries.iter().map(|country| async move {
            let country = country.as_ref();
            validate_country_code(country)?;
            within(deadline, limit, "compare_countries", self.indicator_cached(country)).await
        });

        let mut found = Vec::new();
        for (country, result) in countries.iter().zip(join_all(lookups).await) {
            match result {
                Ok(ppp) => found.push(ppp),
                Err(e) => warn!("Dropping {} from comparison: {}", country.as_ref(), e),
            }
        }

        Ok(rank_countries(found, reference))
    }

    async fn reference_factor(&self) -> Result<f64> {
        match &self.config().reference {
            ReferencePoint::Factor(factor) => Ok(*factor),
            ReferencePoint::Country(country) => {
                let ppp = self
                    .indicator_cached(country)
                    .await
                    .map_err(|e| e.wrapped("failed to get reference PPP data"))?;
                debug!("Reference factor from {} is {}", country, ppp.factor);
                Ok(ppp.factor)
            }
        }
    }
}

/// Summarizes a newest-first series.
pub fn summarize_trend(
    country: &str,
    start_year: i32,
    end_year: i32,
    history: &[IndicatorObservation],
) -> Result<TrendAnalysis> {
    let (Some(newest), Some(oldest)) = (history.first(), history.last()) else {
        return Err(Error::no_data(format!(
            "no historical PPP data available for country {country}"
        ))
        .with_context("country_code", country)
        .with_context("start_year", start_year)
        .with_context("end_year", end_year));
    };

    let n = history.len() as f64;
    let average = history.iter().map(|h| h.factor).sum::<f64>() / n;

    let change = (newest.factor - oldest.factor) / oldest.factor * 100.0;
    let trend = if change > TREND_THRESHOLD {
        Trend::Increasing
    } else if change < -TREND_THRESHOLD {
        Trend::Decreasing
    } else {
        Trend::Stable
    };

    let volatility = if history.len() > 1 {
        history
            .iter()
            .map(|h| (h.factor - average).powi(2))
            .sum::<f64>()
            / (n - 1.0)
    } else {
        0.0
    };

    Ok(TrendAnalysis {
        country: country.to_string(),
        start_year,
        end_year,
        average,
        trend,
        volatility,
        data_points: history.len(),
    })
}

fn rank_countries(mut found: Vec<IndicatorObservation>, reference: f64) -> Vec<CountryRanking> {
    found.sort_by(|a, b| a.factor.total_cmp(&b.factor));
    found
        .into_iter()
        .enumerate()
        .map(|(i, ppp)| CountryRanking {
            percent_of_reference: reference / ppp.factor * 100.0,
            country: ppp.country_code,
            country_name: ppp.country_name,
            factor: ppp.factor,
            rank: i + 1,
        })
        .collect()
}
