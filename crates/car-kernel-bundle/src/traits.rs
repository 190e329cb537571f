//! BundleCache trait: an injected store for bundles awaiting pickup.
//!
//! Exported bundles are held briefly between assembly and download. The cache
//! is owned by the caller and passed in explicitly. Time is an argument, so
//! expiry is deterministic under test.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// How long a pending bundle stays retrievable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Time to live in milliseconds.
    pub ttl_ms: i64,
}

impl ExpiryPolicy {
    pub const fn new(ttl_ms: i64) -> Self {
        Self { ttl_ms }
    }

    /// Whether an entry stored at `stored_at_ms` has expired at `now_ms`.
    pub fn is_expired(&self, stored_at_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(stored_at_ms) >= self.ttl_ms
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(10 * 60 * 1000)
    }
}

/// Async interface for pending-bundle storage.
///
/// Expired entries are never returned, whether or not they have been purged.
#[async_trait]
pub trait BundleCache: Send + Sync {
    /// Store a bundle under `key`, replacing any previous entry.
    async fn put(&self, key: &str, bundle: Bytes, now_ms: i64) -> Result<()>;

    /// Fetch a bundle without removing it.
    async fn get(&self, key: &str, now_ms: i64) -> Result<Option<Bytes>>;

    /// Fetch and remove a bundle.
    async fn take(&self, key: &str, now_ms: i64) -> Result<Option<Bytes>>;

    /// Drop every expired entry. Returns how many were removed.
    async fn purge_expired(&self, now_ms: i64) -> Result<usize>;

    /// Number of entries currently held, expired or not.
    async fn len(&self) -> Result<usize>;
}
