//! poilayer - cached, merged point-of-interest layers
//!
//! This library serves map points for a region by combining an external
//! geodata service (Overpass) with internally-owned record sets. Upstream
//! results are cached with stale-while-revalidate semantics, concurrent
//! refreshes of one region share a single upstream request, and merged
//! results are memoized as short-lived snapshots.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use poilayer::pipeline::{Pipeline, PipelineConfig};
//! use poilayer::provider::{AsyncReqwestClient, UpstreamFetcher};
//! use poilayer::records::InMemoryRecordSource;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AsyncReqwestClient::new()?;
//! let upstream = Arc::new(UpstreamFetcher::with_default_endpoints(client));
//! let records = Arc::new(InMemoryRecordSource::new());
//! let pipeline = Pipeline::new(PipelineConfig::default(), upstream, records);
//!
//! let merged = pipeline
//!     .get_merged_elements(Some("126.9,37.5,127.1,37.6"))
//!     .await?;
//! println!("{} elements", merged.meta.total);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod element;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod records;
pub mod region;
pub mod time;
