//! Process-local cache for provider data.
//!
//! All namespaces share one expiring map. A [`CacheKey`] names the dataset and
//! its textual form (`ppp:TR`, `rate:USD:TRY`, `countries:all`,
//! `indicators:search:<query>`) is only used in snapshot files.

pub mod memory;
pub mod snapshot;

use crate::core::cache::Cache;
use crate::core::{Country, IndicatorMeta, IndicatorObservation, RateObservation};
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

pub use memory::MemoryCache;
pub use snapshot::Snapshot;

/// The cache behind [`crate::Client`]. Clients built from the same handle
/// share entries.
pub type SharedCache = Arc<dyn Cache<CacheKey, CachedValue>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Indicator,
    Rate,
    Countries,
    IndicatorSearch,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Indicator => "ppp",
            Namespace::Rate => "rate",
            Namespace::Countries => "countries",
            Namespace::IndicatorSearch => "indicators",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    Indicator { country: String },
    Rate { base: String, quote: String },
    Countries,
    IndicatorSearch { query: String },
}

impl CacheKey {
    pub fn indicator(country: &str) -> Self {
        CacheKey::Indicator {
            country: country.to_string(),
        }
    }

    pub fn rate(base: &str, quote: &str) -> Self {
        CacheKey::Rate {
            base: base.to_string(),
            quote: quote.to_string(),
        }
    }

    /// Search keys are trimmed and lower-cased so equivalent queries share an entry.
    pub fn indicator_search(query: &str) -> Self {
        CacheKey::IndicatorSearch {
            query: query.trim().to_lowercase(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            CacheKey::Indicator { .. } => Namespace::Indicator,
            CacheKey::Rate { .. } => Namespace::Rate,
            CacheKey::Countries => Namespace::Countries,
            CacheKey::IndicatorSearch { .. } => Namespace::IndicatorSearch,
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = self.namespace().prefix();
        match self {
            CacheKey::Indicator { country } => write!(f, "{prefix}:{country}"),
            CacheKey::Rate { base, quote } => write!(f, "{prefix}:{base}:{quote}"),
            CacheKey::Countries => write!(f, "{prefix}:all"),
            CacheKey::IndicatorSearch { query } => write!(f, "{prefix}:search:{query}"),
        }
    }
}

impl FromStr for CacheKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || anyhow::anyhow!("Invalid cache key: {}", s);
        let (prefix, rest) = s.split_once(':').ok_or_else(invalid)?;

        match prefix {
            "ppp" if !rest.is_empty() && !rest.contains(':') => Ok(CacheKey::indicator(rest)),
            "rate" => match rest.split_once(':') {
                Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
                    Ok(CacheKey::rate(base, quote))
                }
                _ => Err(invalid()),
            },
            "countries" if rest == "all" => Ok(CacheKey::Countries),
            "indicators" => rest
                .strip_prefix("search:")
                .map(|query| CacheKey::IndicatorSearch {
                    query: query.to_string(),
                })
                .ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Indicator(IndicatorObservation),
    Rate(RateObservation),
    Countries(Vec<Country>),
    IndicatorSearch(Vec<IndicatorMeta>),
}

impl CachedValue {
    pub fn namespace(&self) -> Namespace {
        match self {
            CachedValue::Indicator(_) => Namespace::Indicator,
            CachedValue::Rate(_) => Namespace::Rate,
            CachedValue::Countries(_) => Namespace::Countries,
            CachedValue::IndicatorSearch(_) => Namespace::IndicatorSearch,
        }
    }

    /// The bare payload, without a variant tag. The key says what it is.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        match self {
            CachedValue::Indicator(v) => serde_json::to_value(v),
            CachedValue::Rate(v) => serde_json::to_value(v),
            CachedValue::Countries(v) => serde_json::to_value(v),
            CachedValue::IndicatorSearch(v) => serde_json::to_value(v),
        }
    }

    pub fn from_json(namespace: Namespace, payload: Value) -> serde_json::Result<Self> {
        Ok(match namespace {
            Namespace::Indicator => CachedValue::Indicator(serde_json::from_value(payload)?),
            Namespace::Rate => CachedValue::Rate(serde_json::from_value(payload)?),
            Namespace::Countries => CachedValue::Countries(serde_json::from_value(payload)?),
            Namespace::IndicatorSearch => {
                CachedValue::IndicatorSearch(serde_json::from_value(payload)?)
            }
        })
    }
}
