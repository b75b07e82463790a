//! Purchasing-power-parity price recommendations.
//!
//! A [`Client`] combines a country's PPP conversion factor with a currency
//! exchange rate, caching both, and derives trend, comparison and pricing
//! views from them. The [`quick`] module wraps a shared default client for
//! one-off calls.

pub mod analysis;
pub mod client;
pub mod core;
pub mod pricing;
pub mod providers;
pub mod quick;
pub mod store;

#[cfg(test)]
mod testing;

pub use client::{Client, ClientBuilder};
pub use crate::core::config::{ClientConfig, ReferencePoint};
pub use crate::core::{
    Country, CountryRanking, Error, ErrorCode, IndicatorMeta, IndicatorObservation,
    RateObservation, Recommendation, Result, Trend, TrendAnalysis,
};
pub use pricing::{
    PricingTier, RecommendationEngine, SaasPricing, format_price, market_basket, round_price,
    standard_tiers,
};
