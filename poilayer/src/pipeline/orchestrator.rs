//! Request orchestration across the snapshot and raw cache tiers.
//!
//! Per request:
//!
//! 1. A snapshot younger than the snapshot TTL is returned as-is.
//! 2. Otherwise the raw entry is classified:
//!    - fresh: used directly
//!    - stale: used directly, revalidated in the background
//!    - expired or missing: revalidated and awaited; on failure the old
//!      entry (if any) is served marked stale with the error
//! 3. Raw elements are merged with the internal record sets.
//! 4. The snapshot is rewritten unless a snapshot exists and the raw data
//!    was a fresh hit. A result carrying an upstream error with no raw
//!    elements is never written.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::config::PipelineConfig;
use super::types::{MergeMeta, MergeResult, PipelineError};
use crate::aggregate::aggregate;
use crate::cache::{
    Freshness, MemoryCacheProvider, RawCacheStore, ServiceCacheError, Snapshot, SnapshotStore,
};
use crate::coordinator::{CoordinatorStats, RevalidateError, RevalidationCoordinator};
use crate::element::Element;
use crate::provider::Upstream;
use crate::query::QueryBuilder;
use crate::records::{OperatorStatus, RecordSource};
use crate::region::{parse_region_query, region_to_cache_key, CacheKey, Region};
use crate::time::{Clock, SystemClock};

/// Raw-tier outcome for one request.
#[derive(Debug, Default)]
struct RawState {
    elements: Vec<Element>,
    cached: bool,
    stale: bool,
    revalidating: bool,
    error: Option<String>,
}

impl RawState {
    fn fresh_hit(&self) -> bool {
        self.cached && !self.stale && self.error.is_none()
    }

    fn is_outage(&self) -> bool {
        self.error.is_some() && self.elements.is_empty()
    }
}

/// Decides whether a merged result replaces the stored snapshot.
fn should_write_snapshot(has_snapshot: bool, raw: &RawState) -> bool {
    (!has_snapshot || !raw.fresh_hit()) && !raw.is_outage()
}

/// The geodata caching and aggregation pipeline.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use poilayer::pipeline::{Pipeline, PipelineConfig};
///
/// let pipeline = Pipeline::new(PipelineConfig::default(), Arc::new(fetcher), Arc::new(records));
/// let result = pipeline.get_merged_elements(Some("127.0,37.0,127.1,37.1")).await?;
/// println!("{} elements", result.meta.total);
/// pipeline.shutdown().await;
/// ```
pub struct Pipeline<U, R> {
    config: PipelineConfig,
    query_builder: QueryBuilder,
    coordinator: RevalidationCoordinator<U>,
    raw: Arc<RawCacheStore>,
    snapshots: SnapshotStore,
    records: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<U, R> Pipeline<U, R>
where
    U: Upstream + 'static,
    R: RecordSource,
{
    /// Creates a pipeline with in-memory stores and the system clock.
    pub fn new(config: PipelineConfig, upstream: Arc<U>, records: Arc<R>) -> Self {
        Self::with_clock(config, upstream, records, Arc::new(SystemClock))
    }

    /// Creates a pipeline with in-memory stores and the given clock.
    pub fn with_clock(
        config: PipelineConfig,
        upstream: Arc<U>,
        records: Arc<R>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let raw = Arc::new(RawCacheStore::new(Arc::new(MemoryCacheProvider::new(
            config.cache_size_bytes,
            None,
        ))));
        // Expired snapshots stay readable: their presence drives the write decision.
        let snapshots = SnapshotStore::new(Arc::new(MemoryCacheProvider::new(
            config.cache_size_bytes,
            None,
        )));
        Self::with_stores(config, upstream, records, raw, snapshots, clock)
    }

    /// Creates a pipeline over caller-provided stores.
    pub fn with_stores(
        config: PipelineConfig,
        upstream: Arc<U>,
        records: Arc<R>,
        raw: Arc<RawCacheStore>,
        snapshots: SnapshotStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let coordinator =
            RevalidationCoordinator::new(upstream, Arc::clone(&raw), Arc::clone(&clock));
        Self {
            query_builder: QueryBuilder::new(config.territory.clone()),
            config,
            coordinator,
            raw,
            snapshots,
            records,
            clock,
        }
    }

    /// Returns merged elements for a raw region query.
    ///
    /// `None` or a blank string selects the whole territory; anything else
    /// must be `minLon,minLat,maxLon,maxLat`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidRegion`] for a malformed query, otherwise as
    /// [`Pipeline::get_merged_elements_for`].
    pub async fn get_merged_elements(
        &self,
        raw_query: Option<&str>,
    ) -> Result<MergeResult, PipelineError> {
        let region = parse_region_query(raw_query)?;
        self.get_merged_elements_for(&region).await
    }

    /// Returns merged elements for `region`.
    ///
    /// # Errors
    ///
    /// Store and record-source failures. An unavailable upstream is not an
    /// error: it is reported in `meta.upstream_error`.
    pub async fn get_merged_elements_for(
        &self,
        region: &Region,
    ) -> Result<MergeResult, PipelineError> {
        let started = Instant::now();
        let key = region_to_cache_key(region, self.config.key_precision);

        let existing = self.snapshots.get(&key).await?;
        let has_snapshot = existing.is_some();
        if let Some(snapshot) = existing {
            if snapshot.is_fresh(self.clock.now_ms(), self.config.snapshot_ttl) {
                let mut meta = snapshot.meta;
                meta.snapshot_cached = true;
                let result = MergeResult {
                    elements: snapshot.elements,
                    meta,
                };
                self.log_request(&key, &result.meta, started);
                return Ok(result);
            }
        }

        let raw = self.load_raw(&key, region).await?;

        let (curated, operator, community) = tokio::try_join!(
            self.records.list_curated_records(region),
            self.records.list_operator_records(OperatorStatus::Active),
            self.records.list_approved_community_records(),
        )?;

        let merged = aggregate(region, &raw.elements, &curated, &operator, &community);
        let meta = MergeMeta {
            upstream: merged.counts.upstream,
            curated: merged.counts.curated,
            operator: merged.counts.operator,
            community: merged.counts.community,
            total: merged.elements.len(),
            cached: raw.cached,
            stale: raw.stale,
            revalidating: raw.revalidating,
            upstream_error: raw.error.clone(),
            snapshot_cached: false,
        };

        if should_write_snapshot(has_snapshot, &raw) {
            let snapshot = Snapshot {
                key: key.clone(),
                region: region.bbox().copied(),
                generated_at_ms: self.clock.now_ms(),
                elements: merged.elements.clone(),
                meta: meta.clone(),
            };
            self.snapshots.put(&snapshot).await?;
            debug!(cache_key = %key, elements = snapshot.elements.len(), "Snapshot written");
        } else {
            debug!(
                cache_key = %key,
                outage = raw.is_outage(),
                "Snapshot write skipped"
            );
        }

        let result = MergeResult {
            elements: merged.elements,
            meta,
        };
        self.log_request(&key, &result.meta, started);
        Ok(result)
    }

    /// Classifies the raw entry for `key` and revalidates as needed.
    async fn load_raw(&self, key: &CacheKey, region: &Region) -> Result<RawState, PipelineError> {
        let policy = self.config.policy_for(region);
        let entry = self.raw.get(key).await?;
        let freshness = entry
            .as_ref()
            .map(|e| e.freshness(self.clock.now_ms(), policy));

        match (entry, freshness) {
            (Some(entry), Some(Freshness::Fresh)) => {
                debug!(cache_key = %key, "Raw cache fresh hit");
                Ok(RawState {
                    elements: entry.into_elements(),
                    cached: true,
                    ..RawState::default()
                })
            }
            (Some(entry), Some(Freshness::Stale)) => {
                debug!(cache_key = %key, "Raw cache stale hit, revalidating in background");
                self.coordinator.revalidate_in_background(
                    key.clone(),
                    self.query_builder.build(region),
                    policy,
                );
                Ok(RawState {
                    elements: entry.into_elements(),
                    cached: true,
                    stale: true,
                    revalidating: true,
                    error: None,
                })
            }
            (previous, _) => {
                debug!(
                    cache_key = %key,
                    expired = previous.is_some(),
                    "Raw cache miss, revalidating"
                );
                match self
                    .coordinator
                    .revalidate(key.clone(), self.query_builder.build(region), policy)
                    .await
                {
                    Ok(entry) => Ok(RawState {
                        elements: entry.elements().to_vec(),
                        ..RawState::default()
                    }),
                    Err(RevalidateError::Store(reason)) => {
                        Err(PipelineError::Store(ServiceCacheError::Provider(reason)))
                    }
                    Err(e) => Ok(match previous {
                        Some(old) => RawState {
                            elements: old.into_elements(),
                            cached: true,
                            stale: true,
                            revalidating: false,
                            error: Some(e.to_string()),
                        },
                        None => RawState {
                            error: Some(e.to_string()),
                            ..RawState::default()
                        },
                    }),
                }
            }
        }
    }

    fn log_request(&self, key: &CacheKey, meta: &MergeMeta, started: Instant) {
        if !self.config.log_requests {
            return;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if self.config.log_detail {
            info!(
                cache_key = %key,
                total = meta.total,
                upstream = meta.upstream,
                curated = meta.curated,
                operator = meta.operator,
                community = meta.community,
                cached = meta.cached,
                stale = meta.stale,
                revalidating = meta.revalidating,
                snapshot_cached = meta.snapshot_cached,
                upstream_error = meta.upstream_error.as_deref().unwrap_or("none"),
                elapsed_ms = elapsed_ms,
                "Merged elements served"
            );
        } else {
            info!(
                cache_key = %key,
                total = meta.total,
                elapsed_ms = elapsed_ms,
                "Merged elements served"
            );
        }
    }

    /// Clears the raw cache and every snapshot.
    ///
    /// Run after internal records change so the next request re-merges.
    pub async fn invalidate_all(&self) -> Result<(), PipelineError> {
        self.raw.clear().await?;
        self.snapshots.clear().await?;
        info!("Geodata caches cleared");
        Ok(())
    }

    /// Waits for background revalidations to finish and logs statistics.
    pub async fn shutdown(&self) {
        self.coordinator.drain().await;
        self.coordinator.log_stats();
    }

    /// Returns revalidation statistics.
    pub fn stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn raw_store(&self) -> &RawCacheStore {
        &self.raw
    }

    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, TtlPolicy};
    use crate::coordinator::tests::{unavailable, upstream_element, MockUpstream};
    use crate::records::{CuratedRecord, InMemoryRecordSource};
    use crate::time::ManualClock;
    use std::time::Duration;

    const BBOX: &str = "127.0,37.0,127.1,37.1";

    fn quiet_config() -> PipelineConfig {
        PipelineConfig {
            log_requests: false,
            ..PipelineConfig::default()
        }
    }

    fn pipeline(
        upstream: MockUpstream,
    ) -> (
        Pipeline<MockUpstream, InMemoryRecordSource>,
        Arc<MockUpstream>,
        Arc<ManualClock>,
    ) {
        let upstream = Arc::new(upstream);
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let pipeline = Pipeline::with_clock(
            quiet_config(),
            Arc::clone(&upstream),
            Arc::new(InMemoryRecordSource::new()),
            clock.clone(),
        );
        (pipeline, upstream, clock)
    }

    #[test]
    fn test_snapshot_write_decision() {
        let fresh = RawState {
            cached: true,
            ..RawState::default()
        };
        let fetched = RawState::default();
        let outage = RawState {
            error: Some("down".to_string()),
            ..RawState::default()
        };
        let fallback = RawState {
            elements: vec![upstream_element(1, 37.0, 127.0, "A")],
            cached: true,
            stale: true,
            error: Some("down".to_string()),
            ..RawState::default()
        };

        assert!(!should_write_snapshot(true, &fresh));
        assert!(should_write_snapshot(false, &fresh));
        assert!(should_write_snapshot(true, &fetched));
        assert!(!should_write_snapshot(true, &outage));
        assert!(!should_write_snapshot(false, &outage));
        assert!(should_write_snapshot(true, &fallback));
    }

    #[test]
    fn test_empty_success_is_not_an_outage() {
        // A legitimately empty region still gets a snapshot
        assert!(should_write_snapshot(true, &RawState::default()));
    }

    #[tokio::test]
    async fn test_invalid_region_is_a_request_error() {
        let (pipeline, upstream, _) = pipeline(MockUpstream::returning(vec![]));

        let err = pipeline.get_merged_elements(Some("1,2,3")).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRegion(_)));
        assert_eq!(upstream.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cold_outage_returns_empty_with_error_and_no_snapshot() {
        let (pipeline, upstream, _) = pipeline(MockUpstream::failing());

        let result = pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        assert!(result.elements.is_empty());
        assert!(!result.meta.cached);
        assert_eq!(
            result.meta.upstream_error,
            Some(RevalidateError::Upstream(unavailable()).to_string())
        );

        // The outage was not cached: the next request tries upstream again
        pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        assert_eq!(upstream.call_count(), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_served_when_upstream_fails() {
        let (pipeline, upstream, clock) =
            pipeline(MockUpstream::returning(vec![upstream_element(1, 37.05, 127.05, "A")]));

        pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

        // Past the snapshot TTL and the raw stale window
        clock.advance(Duration::from_secs(2 * 24 * 60 * 60));
        upstream.set_result(Err(unavailable()));

        let result = pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        assert_eq!(result.elements.len(), 1);
        assert!(result.meta.cached);
        assert!(result.meta.stale);
        assert!(!result.meta.revalidating);
        assert!(result.meta.upstream_error.is_some());
    }

    #[tokio::test]
    async fn test_outage_does_not_overwrite_snapshot() {
        let (pipeline, upstream, clock) =
            pipeline(MockUpstream::returning(vec![upstream_element(1, 37.05, 127.05, "A")]));
        let key = region_to_cache_key(&parse_region_query(Some(BBOX)).unwrap(), 2);

        pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        let good = pipeline.snapshot_store().get(&key).await.unwrap().unwrap();

        // Lose the raw entry and the upstream at once
        pipeline.raw_store().clear().await.unwrap();
        clock.advance(Duration::from_secs(61));
        upstream.set_result(Err(unavailable()));

        let result = pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        assert!(result.elements.is_empty());
        assert!(result.meta.upstream_error.is_some());

        let kept = pipeline.snapshot_store().get(&key).await.unwrap().unwrap();
        assert_eq!(kept, good);
    }

    #[tokio::test]
    async fn test_fresh_hit_with_snapshot_skips_rewrite() {
        let (pipeline, upstream, clock) =
            pipeline(MockUpstream::returning(vec![upstream_element(1, 37.05, 127.05, "A")]));
        let key = region_to_cache_key(&parse_region_query(Some(BBOX)).unwrap(), 2);

        pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        let first = pipeline.snapshot_store().get(&key).await.unwrap().unwrap();

        // Snapshot expired, raw entry still fresh
        clock.advance(Duration::from_secs(61));
        let result = pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        assert!(result.meta.cached);
        assert!(!result.meta.snapshot_cached);
        assert_eq!(upstream.call_count(), 1);

        let second = pipeline.snapshot_store().get(&key).await.unwrap().unwrap();
        assert_eq!(second.generated_at_ms, first.generated_at_ms);
    }

    #[tokio::test]
    async fn test_territory_uses_territory_key_and_policy() {
        let (pipeline, _upstream, clock) =
            pipeline(MockUpstream::returning(vec![upstream_element(1, 35.0, 129.0, "Busan")]));

        let result = pipeline.get_merged_elements(None).await.unwrap();
        assert_eq!(result.meta.total, 1);

        let entry = pipeline
            .raw_store()
            .get(&CacheKey::territory())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            entry.expires_at_ms(),
            clock.now_ms() + TtlPolicy::territory().ttl().as_millis() as i64
        );
    }

    #[tokio::test]
    async fn test_inactive_operator_rows_are_excluded() {
        use crate::records::{OperatorRecord, OperatorStatus};

        let upstream = Arc::new(MockUpstream::returning(vec![]));
        let records = InMemoryRecordSource::new();
        records.replace_operator(vec![
            OperatorRecord {
                id: "1".to_string(),
                name: "Open".to_string(),
                lat: Some(37.05),
                lon: Some(127.05),
                region: "Seoul".to_string(),
                memo: String::new(),
                status: OperatorStatus::Active,
            },
            OperatorRecord {
                id: "2".to_string(),
                name: "Closed".to_string(),
                lat: Some(37.06),
                lon: Some(127.06),
                region: "Seoul".to_string(),
                memo: String::new(),
                status: OperatorStatus::Inactive,
            },
        ]);
        let pipeline = Pipeline::with_clock(
            quiet_config(),
            upstream,
            Arc::new(records),
            Arc::new(ManualClock::new(0)),
        );

        let result = pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        assert_eq!(result.meta.operator, 1);
        assert_eq!(result.elements[0].name(), "Open");
    }

    #[tokio::test]
    async fn test_invalidate_all_forces_refetch() {
        let (pipeline, upstream, _) =
            pipeline(MockUpstream::returning(vec![upstream_element(1, 37.05, 127.05, "A")]));

        pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        pipeline.invalidate_all().await.unwrap();

        let result = pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        assert!(!result.meta.snapshot_cached);
        assert!(!result.meta.cached);
        assert_eq!(upstream.call_count(), 2);
    }

    #[tokio::test]
    async fn test_stale_entry_from_legacy_store_is_served() {
        let (pipeline, upstream, clock) = pipeline(MockUpstream::returning(vec![]));
        let key = CacheKey::territory();

        // Expired ten minutes ago, no stale deadline recorded
        let now = clock.now_ms();
        let legacy = CacheEntry::from_parts(
            key.clone(),
            vec![upstream_element(7, 35.0, 129.0, "Old")],
            now - 3_600_000,
            now - 600_000,
            None,
        );
        pipeline.raw_store().put(&legacy).await.unwrap();

        let result = pipeline.get_merged_elements(None).await.unwrap();
        assert!(result.meta.stale);
        assert!(result.meta.revalidating);
        assert_eq!(result.elements.len(), 1);

        pipeline.shutdown().await;
        assert_eq!(upstream.call_count(), 1);
    }

    #[tokio::test]
    async fn test_curated_rows_reach_result() {
        let upstream = Arc::new(MockUpstream::returning(vec![]));
        let records = InMemoryRecordSource::new();
        records.replace_curated(vec![CuratedRecord {
            id: "1".to_string(),
            name: "Garden".to_string(),
            lat: Some(37.05),
            lon: Some(127.05),
            region: "Seoul".to_string(),
        }]);
        let pipeline = Pipeline::with_clock(
            quiet_config(),
            upstream,
            Arc::new(records),
            Arc::new(ManualClock::new(0)),
        );

        let result = pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
        assert_eq!(result.meta.curated, 1);
        assert_eq!(result.elements[0].id().to_string(), "curated-1");
    }
}
