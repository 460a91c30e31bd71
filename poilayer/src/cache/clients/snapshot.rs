//! Snapshot cache client.
//!
//! Stores the fully merged result per cache key so bursts of identical
//! requests skip aggregation entirely. Snapshots are superseded by later
//! writes, never merged.
//!
//! # Key Format
//!
//! Keys follow the format `snapshot:{cache_key}`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::traits::{Cache, ServiceCacheError};
use crate::element::Element;
use crate::pipeline::MergeMeta;
use crate::region::{BoundingBox, CacheKey};
use crate::time::duration_ms;

/// Key prefix for snapshots.
const KEY_PREFIX: &str = "snapshot:";

/// Default snapshot lifetime (60 seconds).
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(60);

/// A fully merged, ready-to-serve result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub key: CacheKey,
    /// Bounding box the snapshot was built for; `None` for the territory.
    pub region: Option<BoundingBox>,
    pub generated_at_ms: i64,
    pub elements: Vec<Element>,
    pub meta: MergeMeta,
}

impl Snapshot {
    /// Returns true while `now_ms < generated_at + ttl`.
    pub fn is_fresh(&self, now_ms: i64, ttl: Duration) -> bool {
        now_ms < self.generated_at_ms.saturating_add(duration_ms(ttl))
    }
}

/// Cache client for merged snapshots.
///
/// Owns its backend: [`SnapshotStore::clear`] clears the whole underlying
/// cache.
pub struct SnapshotStore {
    cache: Arc<dyn Cache>,
}

impl SnapshotStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Looks up the snapshot for `key`, regardless of age.
    ///
    /// Undecodable values are logged and reported as absent.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Snapshot>, ServiceCacheError> {
        let storage_key = Self::storage_key(key);
        let Some(bytes) = self.cache.get(&storage_key).await? else {
            return Ok(None);
        };

        match bincode::deserialize::<Snapshot>(&bytes) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(key = %storage_key, error = %e, "Discarding undecodable snapshot");
                Ok(None)
            }
        }
    }

    /// Stores `snapshot`, superseding any previous one for its key.
    pub async fn put(&self, snapshot: &Snapshot) -> Result<(), ServiceCacheError> {
        let storage_key = Self::storage_key(&snapshot.key);
        let bytes = bincode::serialize(snapshot).map_err(|e| ServiceCacheError::Encode {
            key: storage_key.clone(),
            reason: e.to_string(),
        })?;
        self.cache.set(&storage_key, bytes).await
    }

    /// Removes every snapshot.
    pub async fn clear(&self) -> Result<(), ServiceCacheError> {
        self.cache.clear().await
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    fn storage_key(key: &CacheKey) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}
