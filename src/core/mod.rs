//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod indicator;
pub mod log;
pub mod recommendation;
pub mod validation;

// Re-export main types for cleaner imports
pub use currency::{RateObservation, RateProvider, RateTable};
pub use error::{Error, ErrorCode, Result};
pub use indicator::{Country, IndicatorDataPoint, IndicatorMeta, IndicatorObservation, IndicatorProvider};
pub use recommendation::{CountryRanking, Recommendation, Trend, TrendAnalysis};
