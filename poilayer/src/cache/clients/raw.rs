//! Raw upstream cache client.
//!
//! Holds, per [`CacheKey`], the last successfully fetched upstream element
//! set with its freshness deadlines. Entries are replaced whole; nothing in
//! here merges or patches an existing entry.
//!
//! # Key Format
//!
//! Keys follow the format `raw:{cache_key}`.
//! Example: `raw:127.00,37.00,127.10,37.10`
//!
//! # Freshness
//!
//! ```text
//!   updated_at        expires_at              stale_until
//!       |---- fresh ------|------ stale ------------|---- expired ...
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::traits::{Cache, ServiceCacheError};
use crate::element::Element;
use crate::region::CacheKey;
use crate::time::duration_ms;

/// Key prefix for raw entries.
const KEY_PREFIX: &str = "raw:";

/// Default fresh TTL for bounding-box queries (5 minutes).
pub const DEFAULT_BBOX_TTL: Duration = Duration::from_secs(5 * 60);

/// Default stale window for bounding-box queries (24 hours).
pub const DEFAULT_BBOX_STALE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default fresh TTL for whole-territory queries (30 minutes).
pub const DEFAULT_TERRITORY_TTL: Duration = Duration::from_secs(30 * 60);

/// Default stale window for whole-territory queries (7 days).
pub const DEFAULT_TERRITORY_STALE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Fresh and stale windows applied to a newly fetched entry.
///
/// `stale_ttl` is never shorter than `ttl`, so an entry's stale deadline
/// can only extend its fresh window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    ttl: Duration,
    stale_ttl: Duration,
}

impl TtlPolicy {
    /// Creates a policy, raising `stale_ttl` to `ttl` if it is shorter.
    pub fn new(ttl: Duration, stale_ttl: Duration) -> Self {
        Self {
            ttl,
            stale_ttl: stale_ttl.max(ttl),
        }
    }

    /// Default policy for bounding-box queries.
    pub fn bbox() -> Self {
        Self::new(DEFAULT_BBOX_TTL, DEFAULT_BBOX_STALE_TTL)
    }

    /// Default policy for whole-territory queries.
    pub fn territory() -> Self {
        Self::new(DEFAULT_TERRITORY_TTL, DEFAULT_TERRITORY_STALE_TTL)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stale_ttl(&self) -> Duration {
        self.stale_ttl
    }
}

/// Freshness of a cache entry at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `now < expires_at`: serve as-is.
    Fresh,
    /// `expires_at <= now < stale_until`: serve and revalidate in the background.
    Stale,
    /// `now >= stale_until`: treat as a miss.
    Expired,
}

/// Last-fetched upstream elements for one cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    key: CacheKey,
    elements: Vec<Element>,
    updated_at_ms: i64,
    expires_at_ms: i64,
    /// Absent in entries written before stale windows existed.
    stale_until_ms: Option<i64>,
}

impl CacheEntry {
    /// Builds an entry fetched at `now_ms` under `policy`.
    pub fn new(key: CacheKey, elements: Vec<Element>, now_ms: i64, policy: TtlPolicy) -> Self {
        Self {
            key,
            elements,
            updated_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(duration_ms(policy.ttl)),
            stale_until_ms: Some(now_ms.saturating_add(duration_ms(policy.stale_ttl))),
        }
    }

    /// Rebuilds an entry from stored timestamps.
    ///
    /// Used for entries carried over from another store; `stale_until_ms`
    /// may be missing.
    pub fn from_parts(
        key: CacheKey,
        elements: Vec<Element>,
        updated_at_ms: i64,
        expires_at_ms: i64,
        stale_until_ms: Option<i64>,
    ) -> Self {
        Self {
            key,
            elements,
            updated_at_ms,
            expires_at_ms,
            stale_until_ms,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }

    pub fn updated_at_ms(&self) -> i64 {
        self.updated_at_ms
    }

    pub fn expires_at_ms(&self) -> i64 {
        self.expires_at_ms
    }

    /// Stale deadline, derived as `expires_at + stale_ttl` when missing.
    ///
    /// Never earlier than `expires_at`.
    pub fn stale_until_or(&self, stale_ttl: Duration) -> i64 {
        self.stale_until_ms
            .unwrap_or_else(|| self.expires_at_ms.saturating_add(duration_ms(stale_ttl)))
            .max(self.expires_at_ms)
    }

    /// Classifies this entry at `now_ms`.
    pub fn freshness(&self, now_ms: i64, policy: TtlPolicy) -> Freshness {
        if now_ms < self.expires_at_ms {
            Freshness::Fresh
        } else if now_ms < self.stale_until_or(policy.stale_ttl) {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

/// Cache client for raw upstream entries.
///
/// Owns its backend: [`RawCacheStore::clear`] clears the whole underlying
/// cache.
pub struct RawCacheStore {
    cache: Arc<dyn Cache>,
}

impl RawCacheStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Looks up the entry for `key`.
    ///
    /// An undecodable value is logged and reported as absent; the next
    /// successful revalidation overwrites it.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, ServiceCacheError> {
        let storage_key = Self::storage_key(key);
        let Some(bytes) = self.cache.get(&storage_key).await? else {
            return Ok(None);
        };

        match bincode::deserialize::<CacheEntry>(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(key = %storage_key, error = %e, "Discarding undecodable raw cache entry");
                Ok(None)
            }
        }
    }

    /// Stores `entry`, replacing any previous entry for its key.
    pub async fn put(&self, entry: &CacheEntry) -> Result<(), ServiceCacheError> {
        let storage_key = Self::storage_key(&entry.key);
        let bytes = bincode::serialize(entry).map_err(|e| ServiceCacheError::Encode {
            key: storage_key.clone(),
            reason: e.to_string(),
        })?;
        self.cache.set(&storage_key, bytes).await
    }

    /// Removes the entry for `key`.
    pub async fn delete(&self, key: &CacheKey) -> Result<bool, ServiceCacheError> {
        self.cache.delete(&Self::storage_key(key)).await
    }

    /// Removes every raw entry.
    pub async fn clear(&self) -> Result<(), ServiceCacheError> {
        self.cache.clear().await
    }

    /// Get the current number of entries in the cache.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    fn storage_key(key: &CacheKey) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}
