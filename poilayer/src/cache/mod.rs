//! Two-tier geodata cache.
//!
//! A generic byte-oriented [`Cache`] trait with an in-memory moka provider,
//! plus two typed clients:
//!
//! - [`RawCacheStore`]: last-fetched upstream elements with fresh/stale
//!   deadlines, written only by the revalidation coordinator
//! - [`SnapshotStore`]: short-lived fully merged results
//!
//! ```ignore
//! use std::sync::Arc;
//! use poilayer::cache::{MemoryCacheProvider, RawCacheStore};
//!
//! let raw = RawCacheStore::new(Arc::new(MemoryCacheProvider::new(256 * 1024 * 1024, None)));
//! if let Some(entry) = raw.get(&key).await? {
//!     // classify with entry.freshness(now, policy)
//! }
//! ```

pub mod clients;
pub mod providers;
mod traits;

pub use clients::{
    CacheEntry, Freshness, RawCacheStore, Snapshot, SnapshotStore, TtlPolicy,
    DEFAULT_SNAPSHOT_TTL,
};
pub use providers::MemoryCacheProvider;
pub use traits::{BoxFuture, Cache, ServiceCacheError};
