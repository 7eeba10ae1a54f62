// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Generic TTL (Time-To-Live) cache for reducing HTTP round-trips.
//!
//! Used for data that changes infrequently — the indexer's claim-delay value
//! and fee estimates — so polling does not hammer the endpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// A thread-safe TTL cache for cloneable values.
#[derive(Debug)]
pub struct TtlCache<T: Clone + Send + Sync> {
    slot: RwLock<Option<(T, Instant)>>,
    cache_duration: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone + Send + Sync> TtlCache<T> {
    pub fn new(cache_duration: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            cache_duration,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Return the cached value if it has not expired.
    pub async fn get_if_valid(&self) -> Option<T> {
        let slot = self.slot.read().await;
        if let Some((value, updated_at)) = slot.as_ref() {
            if updated_at.elapsed() < self.cache_duration {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(value.clone());
            }
        }
        None
    }

    /// Store a fresh value, restarting the TTL.
    pub async fn update(&self, value: T) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.slot.write().await;
        *slot = Some((value, Instant::now()));
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_returns_fresh_value() {
        let cache = TtlCache::with_secs(60);
        assert!(cache.get_if_valid().await.is_none());
        cache.update(42u64).await;
        assert_eq!(cache.get_if_valid().await, Some(42));
    }

    #[tokio::test]
    async fn test_cache_expires() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.update("fee".to_string()).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(cache.get_if_valid().await.is_none());
    }

    #[tokio::test]
    async fn test_cache_invalidate_and_stats() {
        let cache = TtlCache::with_secs(60);
        cache.update(7u64).await;
        assert_eq!(cache.get_if_valid().await, Some(7));
        cache.invalidate().await;
        assert!(cache.get_if_valid().await.is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(stats.hit_rate() > 0.0);
    }
}
