//! Policy-driven pricing on top of the client: tiers, SaaS plans, baskets,
//! and currency-aware rounding.

use crate::client::Client;
use crate::core::currency::{currency_for_country, currency_symbol};
use crate::core::error::{Error, Result};
use crate::core::recommendation::Recommendation;
use crate::core::validation::{validate_amount, validate_country_code, validate_currency_code};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Share of the yearly price taken off an annual plan, about two months free.
pub const ANNUAL_DISCOUNT: f64 = 0.167;

/// Currencies usually quoted without minor units.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "JPY", "KRW", "IDR", "VND", "CLP", "PYG", "RWF", "XAF", "XOF", "XPF",
];

/// A flat discount for PPP factors in `[min_factor, max_factor)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTier {
    pub name: String,
    pub min_factor: f64,
    pub max_factor: f64,
    pub discount_percentage: f64,
}

impl PricingTier {
    pub fn new(name: &str, min_factor: f64, max_factor: f64, discount_percentage: f64) -> Self {
        PricingTier {
            name: name.to_string(),
            min_factor,
            max_factor,
            discount_percentage,
        }
    }

    pub fn contains(&self, factor: f64) -> bool {
        factor >= self.min_factor && factor < self.max_factor
    }
}

pub fn standard_tiers() -> Vec<PricingTier> {
    vec![
        PricingTier::new("Premium", 0.0, 0.3, 70.0),
        PricingTier::new("Standard", 0.3, 0.6, 50.0),
        PricingTier::new("Regular", 0.6, 0.9, 25.0),
        PricingTier::new("Full Price", 0.9, 999.0, 0.0),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaasPricing {
    pub monthly: f64,
    pub annual: f64,
    pub annual_savings: f64,
    pub currency: String,
    pub discount_percentage: f64,
    pub ppp_adjusted: bool,
}

pub struct RecommendationEngine {
    client: Arc<Client>,
    tiers: Vec<PricingTier>,
}

impl RecommendationEngine {
    /// An engine using [`standard_tiers`].
    pub fn new(client: Arc<Client>) -> Self {
        Self::with_tiers(client, standard_tiers())
    }

    pub fn with_tiers(client: Arc<Client>, tiers: Vec<PricingTier>) -> Self {
        RecommendationEngine { client, tiers }
    }

    pub fn set_pricing_tiers(&mut self, tiers: Vec<PricingTier>) {
        self.tiers = tiers;
    }

    pub fn tiers(&self) -> &[PricingTier] {
        &self.tiers
    }

    /// First tier whose interval contains `factor`.
    pub fn tier_for(&self, factor: f64) -> Option<&PricingTier> {
        self.tiers.iter().find(|tier| tier.contains(factor))
    }

    /// Like [`Client::recommend`], but a matching tier's flat discount
    /// replaces the PPP-derived price.
    pub async fn recommend_with_tiers(
        &self,
        amount: f64,
        from_currency: &str,
        to_country: &str,
    ) -> Result<Recommendation> {
        let recommendation = self
            .client
            .recommend(amount, from_currency, to_country)
            .await?;
        Ok(self.apply_tier(recommendation))
    }

    fn apply_tier(&self, mut recommendation: Recommendation) -> Recommendation {
        if let Some(tier) = self.tier_for(recommendation.ppp_factor) {
            debug!(
                "Factor {} falls in tier {}",
                recommendation.ppp_factor, tier.name
            );
            recommendation.recommended_amount =
                recommendation.original_amount * (1.0 - tier.discount_percentage / 100.0);
            recommendation.discount_percentage = tier.discount_percentage;
            recommendation.tier = Some(tier.name.clone());
        }
        recommendation
    }

    /// Monthly and annual plan prices for `to_country`.
    pub async fn recommend_saas(
        &self,
        monthly_amount: f64,
        from_currency: &str,
        to_country: &str,
    ) -> Result<SaasPricing> {
        let monthly = self
            .recommend_with_tiers(monthly_amount, from_currency, to_country)
            .await?;
        Ok(saas_pricing(&monthly))
    }
}

fn saas_pricing(monthly: &Recommendation) -> SaasPricing {
    let yearly = monthly.recommended_amount * 12.0;
    let annual = yearly * (1.0 - ANNUAL_DISCOUNT);
    SaasPricing {
        monthly: monthly.recommended_amount,
        annual,
        annual_savings: yearly - annual,
        currency: monthly.target_currency.clone(),
        discount_percentage: monthly.discount_percentage,
        ppp_adjusted: true,
    }
}

/// Prices every item for `to_country` from a single factor and rate lookup.
///
/// Items are checked in name order and the first invalid amount fails the
/// whole basket.
pub async fn market_basket(
    client: &Client,
    items: &BTreeMap<String, f64>,
    from_currency: &str,
    to_country: &str,
) -> Result<BTreeMap<String, f64>> {
    validate_currency_code(from_currency)?;
    validate_country_code(to_country)?;
    if items.is_empty() {
        return Err(Error::invalid_input("no items provided"));
    }

    let (ppp, rate) = client
        .with_deadline(client.config().request_timeout, "market_basket", async {
            client.inputs_for(from_currency, to_country).await
        })
        .await?;
    let to_currency = currency_for_country(to_country);

    items
        .iter()
        .map(|(item, amount)| {
            validate_amount(*amount).map_err(|e| {
                e.wrapped(format!("invalid price for item {item}"))
                    .with_context("item", item)
            })?;
            let adjusted = amount * (ppp.factor / rate.rate);
            Ok((item.clone(), round_price(adjusted, to_currency)))
        })
        .collect()
}

fn is_zero_decimal(currency: &str) -> bool {
    ZERO_DECIMAL_CURRENCIES.contains(&currency)
}

/// Rounds half away from zero, to whole units or cents depending on `currency`.
pub fn round_price(amount: f64, currency: &str) -> f64 {
    if is_zero_decimal(currency) {
        amount.round()
    } else {
        (amount * 100.0).round() / 100.0
    }
}

/// Renders `amount` with the currency's symbol and usual placement.
pub fn format_price(amount: f64, currency: &str) -> String {
    let rounded = round_price(amount, currency);
    let symbol = currency_symbol(currency)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{currency} "));

    match currency {
        "EUR" | "RUB" | "PLN" | "CZK" | "HUF" => format!("{rounded:.2} {symbol}"),
        "JPY" | "KRW" | "IDR" | "VND" | "CLP" => format!("{symbol}{rounded:.0}"),
        _ => format!("{symbol}{rounded:.2}"),
    }
}
