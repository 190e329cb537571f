//! In-memory implementation of the BundleCache trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::{BundleError, Result};
use crate::traits::{BundleCache, ExpiryPolicy};

/// In-memory pending-bundle cache.
///
/// All data is lost when the cache is dropped. Thread-safe via RwLock.
pub struct MemoryBundleCache {
    policy: ExpiryPolicy,
    inner: RwLock<HashMap<String, PendingBundle>>,
}

struct PendingBundle {
    bytes: Bytes,
    stored_at_ms: i64,
}

impl MemoryBundleCache {
    /// Create an empty cache with the given expiry policy.
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self {
            policy,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }
}

impl Default for MemoryBundleCache {
    fn default() -> Self {
        Self::new(ExpiryPolicy::default())
    }
}

#[async_trait]
impl BundleCache for MemoryBundleCache {
    async fn put(&self, key: &str, bundle: Bytes, now_ms: i64) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| BundleError::LockPoisoned)?;
        inner.insert(
            key.to_string(),
            PendingBundle {
                bytes: bundle,
                stored_at_ms: now_ms,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str, now_ms: i64) -> Result<Option<Bytes>> {
        let inner = self.inner.read().map_err(|_| BundleError::LockPoisoned)?;
        Ok(inner
            .get(key)
            .filter(|p| !self.policy.is_expired(p.stored_at_ms, now_ms))
            .map(|p| p.bytes.clone()))
    }

    async fn take(&self, key: &str, now_ms: i64) -> Result<Option<Bytes>> {
        let mut inner = self.inner.write().map_err(|_| BundleError::LockPoisoned)?;
        Ok(inner
            .remove(key)
            .filter(|p| !self.policy.is_expired(p.stored_at_ms, now_ms))
            .map(|p| p.bytes))
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<usize> {
        let mut inner = self.inner.write().map_err(|_| BundleError::LockPoisoned)?;
        let before = inner.len();
        inner.retain(|_, p| !self.policy.is_expired(p.stored_at_ms, now_ms));
        let purged = before - inner.len();
        if purged > 0 {
            debug!(purged, "purged expired bundles");
        }
        Ok(purged)
    }

    async fn len(&self) -> Result<usize> {
        let inner = self.inner.read().map_err(|_| BundleError::LockPoisoned)?;
        Ok(inner.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: i64 = 1_000;

    fn cache() -> MemoryBundleCache {
        MemoryBundleCache::new(ExpiryPolicy::new(TTL))
    }

    #[tokio::test]
    async fn test_put_get_take() {
        let cache = cache();
        cache.put("car:1", Bytes::from_static(b"zip"), 0).await.unwrap();

        assert_eq!(
            cache.get("car:1", 10).await.unwrap(),
            Some(Bytes::from_static(b"zip"))
        );
        assert_eq!(
            cache.take("car:1", 10).await.unwrap(),
            Some(Bytes::from_static(b"zip"))
        );
        assert_eq!(cache.get("car:1", 10).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_hidden() {
        let cache = cache();
        cache.put("a", Bytes::from_static(b"a"), 0).await.unwrap();
        assert!(cache.get("a", TTL - 1).await.unwrap().is_some());
        assert!(cache.get("a", TTL).await.unwrap().is_none());
        assert!(cache.take("a", TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = cache();
        cache.put("old", Bytes::from_static(b"1"), 0).await.unwrap();
        cache.put("new", Bytes::from_static(b"2"), 900).await.unwrap();

        assert_eq!(cache.purge_expired(1_500).await.unwrap(), 1);
        assert_eq!(cache.len().await.unwrap(), 1);
        assert!(cache.get("new", 1_500).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_replaces_and_refreshes() {
        let cache = cache();
        cache.put("k", Bytes::from_static(b"v1"), 0).await.unwrap();
        cache.put("k", Bytes::from_static(b"v2"), 800).await.unwrap();
        assert_eq!(
            cache.get("k", 1_200).await.unwrap(),
            Some(Bytes::from_static(b"v2"))
        );
    }
}
