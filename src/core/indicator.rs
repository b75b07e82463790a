//! Country indicator abstractions and core types

use crate::core::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// World Bank code of the PPP conversion factor (LCU per international $).
pub const PPP_INDICATOR: &str = "PA.NUS.PPP";

/// One measurement of the PPP indicator for a country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorObservation {
    pub country_code: String,
    pub country_name: String,
    pub year: i32,
    pub factor: f64,
    pub retrieved_at: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdValue {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub value: String,
}

/// A single year of an indicator series as the provider reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDataPoint {
    pub indicator: IdValue,
    pub country: IdValue,
    #[serde(rename = "countryiso3code", default)]
    pub country_iso3: String,
    pub date: String,
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub obs_status: String,
    #[serde(default)]
    pub decimal: i32,
}

impl IndicatorDataPoint {
    pub fn year(&self) -> Option<i32> {
        self.date.trim().parse().ok()
    }

    /// The value when it counts as an observation; nulls and non-positive
    /// values mean the provider had nothing for that year.
    pub fn observed_value(&self) -> Option<f64> {
        self.value.filter(|v| *v > 0.0)
    }

    pub fn to_observation(&self, source: &str) -> Option<IndicatorObservation> {
        let factor = self.observed_value()?;
        Some(IndicatorObservation {
            country_code: self.country.id.clone(),
            country_name: self.country.value.clone(),
            year: self.year().unwrap_or_default(),
            factor,
            retrieved_at: Utc::now(),
            source: source.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "iso2code", default)]
    pub iso2_code: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: String,
    #[serde(rename = "iso2Code")]
    pub iso2_code: String,
    pub name: String,
    #[serde(default)]
    pub region: Region,
    #[serde(rename = "adminregion", default)]
    pub admin_region: Region,
    #[serde(rename = "incomeLevel", default)]
    pub income_level: Region,
    #[serde(rename = "lendingType", default)]
    pub lending_type: Region,
    #[serde(rename = "capitalCity", default)]
    pub capital_city: String,
    #[serde(default)]
    pub longitude: String,
    #[serde(default)]
    pub latitude: String,
}

impl Country {
    /// Regional and income groupings come back without a capital city.
    pub fn is_sovereign(&self) -> bool {
        !self.capital_city.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub source: IdValue,
    #[serde(rename = "sourceNote", default)]
    pub source_note: String,
    #[serde(rename = "sourceOrganization", default)]
    pub source_organization: String,
    #[serde(default)]
    pub topics: Vec<IdValue>,
}

#[async_trait]
pub trait IndicatorProvider: Send + Sync {
    /// Fetches `indicator` for `country` over `start_year..=end_year`,
    /// newest year first.
    async fn fetch_indicator(
        &self,
        country: &str,
        indicator: &str,
        start_year: i32,
        end_year: i32,
        per_page: u32,
    ) -> Result<Vec<IndicatorDataPoint>>;

    async fn fetch_countries(&self) -> Result<Vec<Country>>;

    async fn search_indicators(&self, query: &str) -> Result<Vec<IndicatorMeta>>;

    /// Label stored on observations built from this provider.
    fn source_name(&self) -> &str {
        "World Bank"
    }
}
