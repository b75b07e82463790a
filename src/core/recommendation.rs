//! Derived values computed from observations. None of these are cached.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub original_amount: f64,
    pub original_currency: String,
    pub recommended_amount: f64,
    pub target_currency: String,
    pub ppp_factor: f64,
    pub exchange_rate: f64,
    /// Positive when the PPP price is below the plain converted price.
    pub discount_percentage: f64,
    /// Name of the pricing tier that set `recommended_amount`, if any.
    pub tier: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Trend::Increasing => "increasing",
                Trend::Decreasing => "decreasing",
                Trend::Stable => "stable",
            }
        )
    }
}

impl FromStr for Trend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "increasing" => Ok(Trend::Increasing),
            "decreasing" => Ok(Trend::Decreasing),
            "stable" => Ok(Trend::Stable),
            _ => Err(anyhow::anyhow!("Invalid trend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub country: String,
    pub start_year: i32,
    pub end_year: i32,
    pub average: f64,
    pub trend: Trend,
    /// Sample variance of the factors.
    pub volatility: f64,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRanking {
    pub country: String,
    pub country_name: String,
    pub factor: f64,
    pub percent_of_reference: f64,
    pub rank: usize,
}
