//! Domain-specific cache clients.
//!
//! These clients wrap the generic `Cache` trait with key translation and
//! value encoding (bincode).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐     ┌─────────────────────┐
//! │   RawCacheStore     │     │   SnapshotStore     │
//! │                     │     │                     │
//! │ CacheKey → raw:key  │     │ CacheKey → snapshot:│
//! │ CacheEntry codec    │     │ Snapshot codec      │
//! └──────────┬──────────┘     └──────────┬──────────┘
//!            │                           │
//!            ▼                           ▼
//! ┌─────────────────────┐     ┌─────────────────────┐
//! │   Arc<dyn Cache>    │     │   Arc<dyn Cache>    │
//! └─────────────────────┘     └─────────────────────┘
//! ```
//!
//! # Key Formats
//!
//! - Raw entries: `"raw:{cache_key}"` (e.g., `"raw:territory"`)
//! - Snapshots: `"snapshot:{cache_key}"`

mod raw;
mod snapshot;

pub use raw::{
    CacheEntry, Freshness, RawCacheStore, TtlPolicy, DEFAULT_BBOX_STALE_TTL, DEFAULT_BBOX_TTL,
    DEFAULT_TERRITORY_STALE_TTL, DEFAULT_TERRITORY_TTL,
};
pub use snapshot::{Snapshot, SnapshotStore, DEFAULT_SNAPSHOT_TTL};
