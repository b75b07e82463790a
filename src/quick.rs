//! One-call helpers over a shared default [`Client`].
//!
//! The default client is built on first use. Reconfiguring swaps in a new
//! client; callers already holding the old one keep using it.

use crate::client::{Client, within};
use crate::core::error::{Error, ErrorCode, Result};
use crate::core::indicator::{Country, IndicatorMeta};
use crate::core::recommendation::Recommendation;
use crate::core::validation::{validate_amount, validate_country_code, validate_currency_code};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

static DEFAULT_CLIENT: LazyLock<RwLock<Option<Arc<Client>>>> =
    LazyLock::new(|| RwLock::new(None));

/// The shared client, built with the default configuration if none is set.
pub fn default_client() -> Result<Arc<Client>> {
    if let Some(client) = DEFAULT_CLIENT
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
    {
        return Ok(client.clone());
    }

    let mut slot = DEFAULT_CLIENT.write().unwrap_or_else(|e| e.into_inner());
    match slot.as_ref() {
        Some(client) => Ok(client.clone()),
        None => {
            let client = Arc::new(Client::new()?);
            debug!("Built default client");
            *slot = Some(client.clone());
            Ok(client)
        }
    }
}

pub fn set_default_client(client: Client) {
    *DEFAULT_CLIENT.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(client));
}

/// Replaces the default client with one that never caches.
pub fn disable_cache() -> Result<()> {
    set_default_client(Client::builder().without_cache().build()?);
    Ok(())
}

/// Replaces the default client with one caching for `duration`.
pub fn enable_cache(duration: Duration) -> Result<()> {
    set_default_client(Client::builder().cache(duration).build()?);
    Ok(())
}

fn failed(message: &str, err: Error) -> Error {
    Error::wrap(ErrorCode::ApiError, message, err)
}

fn validate_recommendation_inputs(price: f64, from_currency: &str, to_country: &str) -> Result<()> {
    validate_amount(price)?;
    validate_currency_code(from_currency)?;
    validate_country_code(to_country)
}

/// Recommended price of `price` for `to_country`.
pub async fn recommend_price(price: f64, from_currency: &str, to_country: &str) -> Result<f64> {
    validate_recommendation_inputs(price, from_currency, to_country)?;
    let client = default_client()?;
    client
        .recommend(price, from_currency, to_country)
        .await
        .map(|rec| rec.recommended_amount)
        .map_err(|e| {
            failed("failed to calculate recommended price", e)
                .with_context("price", price)
                .with_context("from_currency", from_currency)
                .with_context("to_country", to_country)
        })
}

pub async fn get_factor(country: &str) -> Result<f64> {
    validate_country_code(country)?;
    let client = default_client()?;
    client
        .get_indicator(country)
        .await
        .map(|ppp| ppp.factor)
        .map_err(|e| failed("failed to get PPP factor", e).with_context("country_code", country))
}

/// `price × factor`, without any lookup.
pub fn convert_price(price: f64, factor: f64) -> Result<f64> {
    validate_amount(price)?;
    if factor <= 0.0 || !factor.is_finite() {
        return Err(Error::invalid_input("PPP factor must be positive").with_context("ppp_factor", factor));
    }
    Ok(price * factor)
}

pub async fn get_rate(from: &str, to: &str) -> Result<f64> {
    validate_currency_code(from)?;
    validate_currency_code(to)?;
    let client = default_client()?;
    client
        .get_rate(from, to)
        .await
        .map(|rate| rate.rate)
        .map_err(|e| {
            failed("failed to get exchange rate", e)
                .with_context("from", from)
                .with_context("to", to)
        })
}

pub async fn quick_recommend(
    price: f64,
    from_currency: &str,
    to_country: &str,
) -> Result<Recommendation> {
    validate_recommendation_inputs(price, from_currency, to_country)?;
    let client = default_client()?;
    client
        .recommend(price, from_currency, to_country)
        .await
        .map_err(|e| {
            failed("failed to get recommendation", e)
                .with_context("price", price)
                .with_context("from_currency", from_currency)
                .with_context("to_country", to_country)
        })
}

/// Same as [`quick_recommend`] with the country first.
pub async fn pricing_strategy(
    country: &str,
    base_price: f64,
    base_currency: &str,
) -> Result<Recommendation> {
    quick_recommend(base_price, base_currency, country).await
}

pub async fn list_countries() -> Result<Vec<Country>> {
    let client = default_client()?;
    client
        .countries()
        .await
        .map_err(|e| failed("failed to list countries", e))
}

pub async fn find_indicators(search: &str) -> Result<Vec<IndicatorMeta>> {
    if search.trim().is_empty() {
        return Err(Error::invalid_input("search query cannot be empty"));
    }
    let client = default_client()?;
    client
        .search_indicators(search)
        .await
        .map_err(|e| failed("failed to search indicators", e).with_context("search", search))
}

/// ISO2 code of the country called `name`, ignoring case.
pub async fn get_country_code(name: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::invalid_input("country name cannot be empty"));
    }
    let countries = list_countries().await?;
    match_country_code(&countries, name)
}

/// An exact name match wins; otherwise the name must be a substring of
/// exactly one country.
fn match_country_code(countries: &[Country], name: &str) -> Result<String> {
    let needle = name.trim().to_lowercase();

    if let Some(country) = countries.iter().find(|c| c.name.to_lowercase() == needle) {
        return Ok(country.iso2_code.clone());
    }

    let matches: Vec<&Country> = countries
        .iter()
        .filter(|c| c.name.to_lowercase().contains(&needle))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.iso2_code.clone()),
        [] => Err(Error::no_data(format!("no country found for '{name}'"))),
        several => {
            let suggestions: Vec<String> = several
                .iter()
                .map(|c| format!("{} ({})", c.name, c.iso2_code))
                .collect();
            Err(
                Error::invalid_input(format!("multiple countries found for '{name}'"))
                    .with_context("suggestions", suggestions.join(", ")),
            )
        }
    }
}

/// Recommended prices for several countries at once.
///
/// A country whose lookup fails gets `0.0`; the call only fails when every
/// country does.
pub async fn batch_recommend<S: AsRef<str>>(
    price: f64,
    from_currency: &str,
    countries: &[S],
) -> Result<BTreeMap<String, f64>> {
    validate_amount(price)?;
    validate_currency_code(from_currency)?;
    if countries.is_empty() {
        return Err(Error::invalid_input("no countries provided"));
    }
    for country in countries {
        validate_country_code(country.as_ref())?;
    }

    let client = default_client()?;
    recommend_all(&client, price, from_currency, countries).await
}

/// Runs every recommendation against one `batch_timeout` deadline. A country
/// still pending at the deadline counts as failed.
async fn recommend_all<S: AsRef<str>>(
    client: &Client,
    price: f64,
    from_currency: &str,
    countries: &[S],
) -> Result<BTreeMap<String, f64>> {
    let limit = client.config().batch_timeout;
    let deadline = Instant::now() + limit;
    let results = join_all(countries.iter().map(|country| {
        within(
            deadline,
            limit,
            "batch_recommend",
            client.recommend(price, from_currency, country.as_ref()),
        )
    }))
    .await;

    let mut prices = BTreeMap::new();
    let mut last_error = None;
    for (country, result) in countries.iter().zip(results) {
        let country = country.as_ref().to_string();
        match result {
            Ok(rec) => {
                prices.insert(country, rec.recommended_amount);
            }
            Err(e) => {
                warn!("No recommendation for {}: {}", country, e);
                prices.insert(country, 0.0);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if prices.values().all(|p| *p == 0.0) => Err(failed(
            "failed to get recommendations for all countries",
            e,
        )),
        _ => Ok(prices),
    }
}
