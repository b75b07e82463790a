use crate::core::error::{Error, Result as PppResult};
use crate::core::validation::validate_country_code;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_WORLD_BANK_URL: &str = "https://api.worldbank.org/v2";
pub const DEFAULT_CURRENCY_URL: &str =
    "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WorldBankProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CurrencyProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProvidersConfig {
    pub world_bank: Option<WorldBankProviderConfig>,
    pub currency: Option<CurrencyProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            world_bank: Some(WorldBankProviderConfig {
                base_url: DEFAULT_WORLD_BANK_URL.to_string(),
            }),
            currency: Some(CurrencyProviderConfig {
                base_url: DEFAULT_CURRENCY_URL.to_string(),
            }),
        }
    }
}

impl ProvidersConfig {
    pub fn world_bank_url(&self) -> &str {
        self.world_bank
            .as_ref()
            .map_or(DEFAULT_WORLD_BANK_URL, |p| &p.base_url)
    }

    pub fn currency_url(&self) -> &str {
        self.currency
            .as_ref()
            .map_or(DEFAULT_CURRENCY_URL, |p| &p.base_url)
    }
}

/// What `compare_countries` expresses purchasing power relative to.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePoint {
    /// A fixed PPP factor. `1.0` is the US dollar's own factor.
    Factor(f64),
    /// The latest factor of a country, fetched through the cache.
    Country(String),
}

impl Default for ReferencePoint {
    fn default() -> Self {
        ReferencePoint::Factor(1.0)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClientConfig {
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// TTL of indicator and search entries.
    #[serde(default = "default_cache_duration", with = "secs")]
    pub cache_duration: Duration,
    /// Janitor interval, twice `cache_duration` when unset.
    #[serde(default, with = "opt_secs", skip_serializing_if = "Option::is_none")]
    pub cleanup_interval: Option<Duration>,
    #[serde(default = "default_rate_ttl", with = "secs")]
    pub rate_ttl: Duration,
    #[serde(default = "default_countries_ttl", with = "secs")]
    pub countries_ttl: Duration,
    #[serde(default = "default_request_timeout", with = "secs")]
    pub request_timeout: Duration,
    #[serde(default = "default_rate_timeout", with = "secs")]
    pub rate_timeout: Duration,
    #[serde(default = "default_batch_timeout", with = "secs")]
    pub batch_timeout: Duration,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub reference: ReferencePoint,
}

fn default_true() -> bool {
    true
}

fn default_cache_duration() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_rate_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_countries_ttl() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_rate_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_batch_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            cache_enabled: true,
            cache_duration: default_cache_duration(),
            cleanup_interval: None,
            rate_ttl: default_rate_ttl(),
            countries_ttl: default_countries_ttl(),
            request_timeout: default_request_timeout(),
            rate_timeout: default_rate_timeout(),
            batch_timeout: default_batch_timeout(),
            providers: ProvidersConfig::default(),
            reference: ReferencePoint::default(),
        }
    }
}

impl ClientConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "ppp", "ppp-price")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn effective_cleanup_interval(&self) -> Duration {
        self.cleanup_interval.unwrap_or(self.cache_duration.saturating_mul(2))
    }

    pub fn validate(&self) -> PppResult<()> {
        let durations = [
            ("cache_duration", self.cache_duration),
            ("cleanup_interval", self.effective_cleanup_interval()),
            ("rate_ttl", self.rate_ttl),
            ("countries_ttl", self.countries_ttl),
            ("request_timeout", self.request_timeout),
            ("rate_timeout", self.rate_timeout),
            ("batch_timeout", self.batch_timeout),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(Error::invalid_input(format!("{field} must be greater than zero"))
                    .with_context("field", field));
            }
        }

        for (field, url) in [
            ("providers.world_bank.base_url", self.providers.world_bank_url()),
            ("providers.currency.base_url", self.providers.currency_url()),
        ] {
            if url.trim().is_empty() {
                return Err(Error::invalid_input(format!("{field} cannot be empty"))
                    .with_context("field", field));
            }
        }

        match &self.reference {
            ReferencePoint::Factor(factor) if !factor.is_finite() || *factor <= 0.0 => Err(
                Error::invalid_input("reference factor must be positive")
                    .with_context("reference_factor", factor),
            ),
            ReferencePoint::Country(code) => validate_country_code(code),
            ReferencePoint::Factor(_) => Ok(()),
        }
    }
}

/// Durations as (possibly fractional) seconds in YAML.
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}
