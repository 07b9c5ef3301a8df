//! Rotating provider-key pool with TTL-bounded caching.
//!
//! The metered backend authenticates upstream calls with a pool of
//! provider keys that rotate server-side. Instead of a module-global
//! cache, the pool is a small injected service: it refreshes from its
//! [`KeySource`] when the cache is empty or stale, and hands out keys
//! round-robin.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Default time-to-live for a fetched key set.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(300);

/// Where the pool fetches fresh keys from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch_keys(&self) -> Result<Vec<String>, KeyPoolError>;
}

/// A fixed key list, for tests and single-key deployments.
pub struct StaticKeySource {
    keys: Vec<String>,
}

impl StaticKeySource {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch_keys(&self) -> Result<Vec<String>, KeyPoolError> {
        Ok(self.keys.clone())
    }
}

/// Errors from the key pool.
#[derive(Debug, thiserror::Error)]
pub enum KeyPoolError {
    /// The source returned no keys at all.
    #[error("Key source returned an empty key set")]
    Empty,

    /// The source itself failed.
    #[error("Key source error: {0}")]
    Source(String),
}

/// Cached key set plus its fetch time.
struct CachedKeys {
    keys: Vec<String>,
    fetched_at: Instant,
}

/// TTL-bounded, round-robin provider key pool.
pub struct KeyPool {
    source: Arc<dyn KeySource>,
    ttl: Duration,
    cache: RwLock<Option<CachedKeys>>,
    cursor: AtomicUsize,
}

impl KeyPool {
    pub fn new(source: Arc<dyn KeySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: RwLock::new(None),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Acquire the next key, refreshing from the source when the cache
    /// is missing or older than the TTL.
    pub async fn acquire(&self) -> Result<String, KeyPoolError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(self.pick(&cached.keys));
                }
            }
        }
        self.refresh().await
    }

    /// Drop the cached key set so the next acquire refetches.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Fetch a fresh key set and return a key from it.
    async fn refresh(&self) -> Result<String, KeyPoolError> {
        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(self.pick(&cached.keys));
            }
        }

        let keys = self.source.fetch_keys().await?;
        if keys.is_empty() {
            return Err(KeyPoolError::Empty);
        }
        tracing::debug!(count = keys.len(), "Refreshed provider key pool");

        let key = self.pick(&keys);
        *cache = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(key)
    }

    /// Round-robin selection across the cached key set.
    fn pick(&self, keys: &[String]) -> String {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % keys.len();
        keys[index].clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
