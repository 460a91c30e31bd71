//! Pipeline orchestrator: the single "get merged elements for region" entry
//! point.
//!
//! # Architecture
//!
//! ```text
//! region query
//!     │
//!     ▼
//! ┌──────────────┐ fresh  ┌───────────────┐
//! │ SnapshotStore│───────►│ MergeResult   │ snapshotCached
//! └──────┬───────┘        └───────────────┘
//!        │ miss / expired
//!        ▼
//! ┌──────────────┐ stale/miss ┌─────────────────────────┐
//! │ RawCacheStore│───────────►│ RevalidationCoordinator │──► Upstream
//! └──────┬───────┘            └─────────────────────────┘
//!        │ raw elements
//!        ▼
//! ┌──────────────┐   ┌──────────────┐
//! │  aggregate   │◄──│ RecordSource │ curated / operator / community
//! └──────┬───────┘   └──────────────┘
//!        ▼
//!   snapshot write (conditional) ──► MergeResult
//! ```

mod config;
mod orchestrator;
mod types;

pub use config::{PipelineConfig, DEFAULT_CACHE_SIZE_BYTES};
pub use orchestrator::Pipeline;
pub use types::{MergeMeta, MergeResult, PipelineError};
