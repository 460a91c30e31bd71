//! In-memory cache provider using moka.
//!
//! This provider wraps `moka::future::Cache` to provide an async-safe,
//! lock-free in-memory cache with size-bounded LRU eviction.
//!
//! Freshness is decided by the typed clients from timestamps stored inside
//! each value, not by moka. The optional TTL here is only a hard upper bound
//! on residency.

use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::cache::traits::{BoxFuture, Cache, ServiceCacheError};

/// In-memory cache provider using moka.
pub struct MemoryCacheProvider {
    /// The underlying moka cache.
    cache: MokaCache<String, Vec<u8>>,

    /// Maximum size in bytes.
    max_size_bytes: u64,
}

impl MemoryCacheProvider {
    /// Create a new memory cache provider.
    ///
    /// # Arguments
    ///
    /// * `max_size_bytes` - Maximum cache size in bytes
    /// * `ttl` - Optional time-to-live for entries
    pub fn new(max_size_bytes: u64, ttl: Option<Duration>) -> Self {
        let mut builder = MokaCache::builder()
            // Weight each entry by its data size
            .weigher(|key: &String, value: &Vec<u8>| -> u32 {
                // moka uses u32 for weights, cap at u32::MAX for very large entries
                (key.len() + value.len()).min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes);

        if let Some(ttl_duration) = ttl {
            builder = builder.time_to_live(ttl_duration);
        }

        Self {
            cache: builder.build(),
            max_size_bytes,
        }
    }
}

impl Cache for MemoryCacheProvider {
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move {
            if value.len() as u64 > self.max_size_bytes {
                return Err(ServiceCacheError::ValueTooLarge {
                    size: value.len(),
                    max: self.max_size_bytes as usize,
                });
            }
            self.cache.insert(key, value).await;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.get(&key).await) })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.remove(&key).await.is_some()) })
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.contains_key(&key)) })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
        Box::pin(async move {
            self.cache.invalidate_all();
            // Apply the invalidation so entry_count reflects it
            self.cache.run_pending_tasks().await;
            Ok(())
        })
    }

    fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }
}
