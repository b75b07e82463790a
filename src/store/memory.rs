use crate::core::cache::Cache;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

struct CacheValue<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheValue<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory cache with a TTL on every entry.
///
/// Expired entries are never returned. They are dropped by
/// [`Cache::purge_expired`], which the janitor task runs on an
/// interval. Locks are only held for the map operation itself.
#[derive(Clone)]
pub struct MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<RwLock<HashMap<K, CacheValue<V>>>>,
    default_ttl: Duration,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    /// Spawns a task that purges expired entries every `interval`.
    ///
    /// Returns `None` outside a tokio runtime. The task stops once every clone
    /// of the cache has been dropped.
    pub fn spawn_janitor(&self, interval: Duration) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let weak = Arc::downgrade(&self.inner);
        debug!("Starting cache janitor every {:?}", interval);

        Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("Cache dropped, stopping janitor");
                    break;
                };
                let removed = purge(&inner).await;
                if removed > 0 {
                    debug!("Janitor purged {} expired entries", removed);
                }
            }
        }))
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.read().await;
        match cache.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => {
                debug!("Cache HIT for key: {:?}", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry expired for key: {:?}", key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    async fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        let cache_value = CacheValue { value, expires_at };

        let mut cache = self.inner.write().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, cache_value);
    }

    async fn remove(&self, key: &K) {
        let mut cache = self.inner.write().await;
        cache.remove(key);
        debug!("Cache REMOVE for key: {:?}", key);
    }

    async fn clear(&self) {
        let mut cache = self.inner.write().await;
        cache.clear();
        debug!("Cache CLEAR");
    }

    async fn len(&self) -> usize {
        let now = Instant::now();
        let cache = self.inner.read().await;
        cache.values().filter(|entry| entry.is_live(now)).count()
    }

    async fn live_entries(&self) -> Vec<(K, V)> {
        let now = Instant::now();
        let cache = self.inner.read().await;
        cache
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    async fn purge_expired(&self) -> usize {
        purge(&self.inner).await
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

async fn purge<K, V>(inner: &RwLock<HashMap<K, CacheValue<V>>>) -> usize
where
    K: Eq + Hash,
{
    let now = Instant::now();
    let mut cache = inner.write().await;
    let before = cache.len();
    cache.retain(|_, entry| entry.is_live(now));
    before - cache.len()
}
