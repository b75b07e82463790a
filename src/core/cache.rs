use async_trait::async_trait;
use std::time::Duration;

/// An expiring key-value store shared by every client operation.
///
/// Implementations never return an expired entry.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V>;

    /// Stores `value`; `ttl` of `None` uses [`default_ttl`](Self::default_ttl).
    async fn put(&self, key: K, value: V, ttl: Option<Duration>);

    async fn remove(&self, key: &K);

    async fn clear(&self);

    /// Number of entries that have not expired yet.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Live entries at the time of the call, in no particular order.
    async fn live_entries(&self) -> Vec<(K, V)>;

    /// Drops expired entries and returns how many were removed.
    async fn purge_expired(&self) -> usize;

    fn default_ttl(&self) -> Duration;
}
