//! Snapshot files: a JSON object mapping key strings to payloads.
//!
//! Import is lenient. Keys from unknown namespaces and payloads that do not
//! decode are skipped; only an unreadable or non-object file fails.

use super::{CacheKey, CachedValue};
use crate::core::cache::Cache;
use crate::core::error::{Error, ErrorCode, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Snapshot export and import for any cache of provider data.
#[async_trait]
pub trait Snapshot {
    /// Serializes every live entry as indented JSON.
    async fn export_snapshot(&self) -> Result<String>;

    /// Loads entries from `data`, each with the cache's default TTL. Returns
    /// how many entries were imported.
    async fn import_snapshot(&self, data: &str) -> Result<usize>;

    async fn export_to_file(&self, path: &Path) -> Result<()>;

    async fn import_from_file(&self, path: &Path) -> Result<usize>;
}

#[async_trait]
impl<C> Snapshot for C
where
    C: Cache<CacheKey, CachedValue> + ?Sized,
{
    async fn export_snapshot(&self) -> Result<String> {
        let mut snapshot = BTreeMap::new();
        for (key, value) in self.live_entries().await {
            let payload = value.to_json().map_err(|e| {
                Error::wrap(ErrorCode::CacheError, "failed to marshal cache data", e)
                    .with_context("key", &key)
            })?;
            snapshot.insert(key.to_string(), payload);
        }

        serde_json::to_string_pretty(&snapshot)
            .map_err(|e| Error::wrap(ErrorCode::CacheError, "failed to marshal cache data", e))
    }

    async fn import_snapshot(&self, data: &str) -> Result<usize> {
        let entries: Map<String, Value> = serde_json::from_str(data)
            .map_err(|e| Error::wrap(ErrorCode::CacheError, "failed to unmarshal cache data", e))?;

        let ttl = self.default_ttl();
        let mut imported = 0;
        for (raw_key, payload) in entries {
            let key = match raw_key.parse::<CacheKey>() {
                Ok(key) => key,
                Err(e) => {
                    debug!("Skipping snapshot entry: {}", e);
                    continue;
                }
            };
            match CachedValue::from_json(key.namespace(), payload) {
                Ok(value) => {
                    self.put(key, value, Some(ttl)).await;
                    imported += 1;
                }
                Err(e) => debug!("Skipping snapshot entry {}: {}", raw_key, e),
            }
        }
        debug!("Imported {} snapshot entries with TTL {:?}", imported, ttl);
        Ok(imported)
    }

    async fn export_to_file(&self, path: &Path) -> Result<()> {
        let data = self.export_snapshot().await?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::wrap(ErrorCode::CacheError, "failed to create directory", e)
                    .with_context("path", parent.display())
            })?;
        }
        tokio::fs::write(path, data).await.map_err(|e| {
            Error::wrap(ErrorCode::CacheError, "failed to write cache file", e)
                .with_context("path", path.display())
        })?;

        info!("Exported cache snapshot to {}", path.display());
        Ok(())
    }

    async fn import_from_file(&self, path: &Path) -> Result<usize> {
        let data = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::wrap(ErrorCode::CacheError, "failed to read cache file", e)
                .with_context("path", path.display())
        })?;

        let imported = self
            .import_snapshot(&data)
            .await
            .map_err(|e| e.with_context("path", path.display()))?;
        info!("Imported {} cache entries from {}", imported, path.display());
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Country, IndicatorObservation, RateObservation};
    use crate::store::MemoryCache;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::time::Duration;

    fn observation(code: &str, factor: f64) -> IndicatorObservation {
        IndicatorObservation {
            country_code: code.to_string(),
            country_name: format!("Country {code}"),
            year: 2023,
            factor,
            retrieved_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            source: "World Bank".to_string(),
        }
    }

    fn rate(base: &str, quote: &str, rate: f64) -> RateObservation {
        RateObservation {
            base: base.to_string(),
            quote: quote.to_string(),
            rate,
            as_of: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        }
    }

    async fn populated_cache() -> MemoryCache<CacheKey, CachedValue> {
        let cache = MemoryCache::<CacheKey, CachedValue>::new(Duration::from_secs(3600));
        cache
            .put(
                CacheKey::indicator("TR"),
                CachedValue::Indicator(observation("TR", 11.55)),
                None,
            )
            .await;
        cache
            .put(
                CacheKey::rate("USD", "TRY"),
                CachedValue::Rate(rate("USD", "TRY", 32.1)),
                None,
            )
            .await;
        cache
            .put(CacheKey::Countries, CachedValue::Countries(Vec::<Country>::new()), None)
            .await;
        cache
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let source = populated_cache().await;
        let snapshot = source.export_snapshot().await.unwrap();
        assert!(snapshot.contains("\"ppp:TR\""));
        assert!(snapshot.contains("\"rate:USD:TRY\""));

        let target = MemoryCache::<CacheKey, CachedValue>::new(Duration::from_secs(3600));
        assert_eq!(target.import_snapshot(&snapshot).await.unwrap(), 3);

        for (key, value) in source.live_entries().await {
            assert_eq!(target.get(&key).await, Some(value), "{key} differs");
        }
    }

    #[tokio::test]
    async fn test_import_uses_target_default_ttl() {
        let snapshot = populated_cache().await.export_snapshot().await.unwrap();

        let target = MemoryCache::<CacheKey, CachedValue>::new(Duration::from_millis(10));
        assert_eq!(target.import_snapshot(&snapshot).await.unwrap(), 3);
        assert_eq!(target.len().await, 3);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(target.is_empty().await);
    }

    #[tokio::test]
    async fn test_export_skips_expired_entries() {
        let cache = MemoryCache::<CacheKey, CachedValue>::new(Duration::from_secs(3600));
        cache
            .put(
                CacheKey::indicator("BR"),
                CachedValue::Indicator(observation("BR", 2.5)),
                Some(Duration::from_millis(5)),
            )
            .await;
        tokio::time::sleep(Duration::from_millis(15)).await;

        let snapshot = cache.export_snapshot().await.unwrap();
        assert_eq!(snapshot.trim(), "{}");
    }

    #[tokio::test]
    async fn test_import_is_lenient() {
        let data = r#"{
            "ppp:TR": {
                "country_code": "TR",
                "country_name": "Turkiye",
                "year": 2023,
                "factor": 11.55,
                "retrieved_at": "2024-05-01T12:00:00Z",
                "source": "World Bank"
            },
            "rate:USD:TRY": {"unexpected": true},
            "weather:TR": {"temp": 21},
            "garbage": 1
        }"#;
        let cache = MemoryCache::<CacheKey, CachedValue>::new(Duration::from_secs(3600));
        assert_eq!(cache.import_snapshot(data).await.unwrap(), 1);

        match cache.get(&CacheKey::indicator("TR")).await {
            Some(CachedValue::Indicator(obs)) => assert_eq!(obs.factor, 11.55),
            other => panic!("unexpected entry: {other:?}"),
        }
        assert!(cache.get(&CacheKey::rate("USD", "TRY")).await.is_none());
    }

    #[tokio::test]
    async fn test_import_rejects_non_object() {
        let cache = MemoryCache::<CacheKey, CachedValue>::new(Duration::from_secs(3600));
        let err = cache.import_snapshot("[1, 2, 3]").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CacheError);
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let source = populated_cache().await;
        source.export_to_file(&path).await.unwrap();

        let target = MemoryCache::<CacheKey, CachedValue>::new(Duration::from_secs(3600));
        assert_eq!(target.import_from_file(&path).await.unwrap(), 3);
        assert_eq!(
            target.get(&CacheKey::rate("USD", "TRY")).await,
            source.get(&CacheKey::rate("USD", "TRY")).await
        );
    }

    #[tokio::test]
    async fn test_import_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MemoryCache::<CacheKey, CachedValue>::new(Duration::from_secs(3600));
        let err = cache
            .import_from_file(&dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CacheError);
        assert_eq!(err.message, "failed to read cache file");
    }
}
