//! Integration tests for the merge pipeline.
//!
//! These tests drive the public API end to end:
//! - upstream fetch → raw cache → aggregation → snapshot
//! - stale-while-revalidate with a scripted clock
//! - single-flight coalescing under concurrent load
//!
//! Run with: `cargo test --test pipeline_integration`

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use poilayer::element::{Element, ElementType, SourceKind};
use poilayer::pipeline::{Pipeline, PipelineConfig};
use poilayer::provider::{ProviderError, Upstream};
use poilayer::query::UpstreamQuery;
use poilayer::records::{
    CommunityRecord, CuratedRecord, InMemoryRecordSource, OperatorRecord, OperatorStatus,
    RecordError, RecordSource,
};
use poilayer::region::{parse_region, region_to_cache_key, Region};
use poilayer::time::ManualClock;

// ============================================================================
// Helpers
// ============================================================================

const BBOX: &str = "127.0,37.0,127.1,37.1";
const START_MS: i64 = 1_700_000_000_000;

/// Upstream returning a scripted result, optionally held behind a gate.
struct ScriptedUpstream {
    result: Mutex<Result<Vec<Element>, ProviderError>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    calls: AtomicUsize,
}

impl ScriptedUpstream {
    fn new(elements: Vec<Element>) -> Self {
        Self {
            result: Mutex::new(Ok(elements)),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    fn set_elements(&self, elements: Vec<Element>) {
        *self.result.lock() = Ok(elements);
    }

    fn fail(&self) {
        *self.result.lock() = Err(ProviderError::UpstreamUnavailable {
            attempts: 2,
            last_error: Box::new(ProviderError::HttpError("HTTP 504".to_string())),
        });
    }

    fn close_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Upstream for ScriptedUpstream {
    async fn fetch(&self, _query: &UpstreamQuery) -> Result<Vec<Element>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        self.result.lock().clone()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Record source counting how often the pipeline lists rows.
struct CountingRecords {
    inner: InMemoryRecordSource,
    calls: AtomicUsize,
}

impl CountingRecords {
    fn new(inner: InMemoryRecordSource) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecordSource for CountingRecords {
    async fn list_curated_records(
        &self,
        region: &Region,
    ) -> Result<Vec<CuratedRecord>, RecordError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_curated_records(region).await
    }

    async fn list_operator_records(
        &self,
        status: OperatorStatus,
    ) -> Result<Vec<OperatorRecord>, RecordError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_operator_records(status).await
    }

    async fn list_approved_community_records(&self) -> Result<Vec<CommunityRecord>, RecordError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_approved_community_records().await
    }
}

fn node(id: u64, lat: f64, lon: f64, name: &str) -> Element {
    let mut tags = BTreeMap::new();
    tags.insert("name".to_string(), name.to_string());
    Element::from_upstream(ElementType::Node, id, lat, lon, tags).unwrap()
}

fn two_nodes() -> Vec<Element> {
    vec![
        node(1, 37.05, 127.05, "Harbor Cafe"),
        node(2, 37.06, 127.02, "Pier Market"),
    ]
}

fn curated(id: &str, lat: f64, lon: f64, name: &str) -> CuratedRecord {
    CuratedRecord {
        id: id.to_string(),
        name: name.to_string(),
        lat: Some(lat),
        lon: Some(lon),
        region: "Seoul".to_string(),
    }
}

struct Harness {
    pipeline: Arc<Pipeline<ScriptedUpstream, CountingRecords>>,
    upstream: Arc<ScriptedUpstream>,
    records: Arc<CountingRecords>,
    clock: Arc<ManualClock>,
}

fn harness(upstream: ScriptedUpstream, records: InMemoryRecordSource) -> Harness {
    let upstream = Arc::new(upstream);
    let records = Arc::new(CountingRecords::new(records));
    let clock = Arc::new(ManualClock::new(START_MS));
    let pipeline = Arc::new(Pipeline::with_clock(
        PipelineConfig::default(),
        Arc::clone(&upstream),
        Arc::clone(&records),
        clock.clone(),
    ));
    Harness {
        pipeline,
        upstream,
        records,
        clock,
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

#[tokio::test]
async fn test_cold_request_merges_upstream_and_curated() {
    let records = InMemoryRecordSource::new();
    records.replace_curated(vec![
        curated("1", 37.03, 127.03, "Lighthouse Gallery"),
        curated("2", 35.10, 129.00, "Far Away"),
    ]);
    let h = harness(ScriptedUpstream::new(two_nodes()), records);

    let result = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    assert_eq!(result.elements.len(), 3);
    assert_eq!(result.meta.total, 3);
    assert_eq!(result.meta.upstream, 2);
    assert_eq!(result.meta.curated, 1);
    assert!(!result.meta.cached);
    assert!(!result.meta.stale);
    assert!(!result.meta.snapshot_cached);
    assert!(result.meta.upstream_error.is_none());
    assert!(result
        .elements
        .iter()
        .any(|e| e.source() == SourceKind::Curated && e.name() == "Lighthouse Gallery"));
    assert_eq!(h.upstream.calls(), 1);
}

#[tokio::test]
async fn test_repeat_request_served_from_snapshot() {
    let h = harness(
        ScriptedUpstream::new(two_nodes()),
        InMemoryRecordSource::new(),
    );

    let first = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
    let record_calls = h.records.calls();

    h.clock.advance(Duration::from_secs(10));
    let second = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    assert!(second.meta.snapshot_cached);
    assert_eq!(second.elements, first.elements);
    assert_eq!(h.records.calls(), record_calls);
    assert_eq!(h.upstream.calls(), 1);
}

#[tokio::test]
async fn test_nearby_viewport_shares_cache_entry() {
    let h = harness(
        ScriptedUpstream::new(two_nodes()),
        InMemoryRecordSource::new(),
    );

    h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
    let nearby = h
        .pipeline
        .get_merged_elements(Some("127.001,37.002,127.099,37.098"))
        .await
        .unwrap();

    assert!(nearby.meta.snapshot_cached);
    assert_eq!(h.upstream.calls(), 1);
}

#[tokio::test]
async fn test_stale_entry_survives_failing_upstream() {
    let h = harness(
        ScriptedUpstream::new(two_nodes()),
        InMemoryRecordSource::new(),
    );
    h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    // Past the fresh window, inside the stale window.
    h.upstream.fail();
    h.clock.advance(Duration::from_secs(301));
    let stale = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    assert!(stale.meta.stale);
    assert!(stale.meta.revalidating);
    assert!(stale.meta.upstream_error.is_none());
    assert_eq!(stale.meta.upstream, 2);

    h.pipeline.shutdown().await;
    assert_eq!(h.pipeline.stats().fetches_failed, 1);

    // Past the stale window: the fetch is awaited, fails, and the old entry is kept.
    h.clock.advance(Duration::from_secs(24 * 60 * 60));
    let expired = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    assert!(expired.meta.stale);
    assert!(expired.meta.cached);
    assert!(!expired.meta.revalidating);
    assert_eq!(expired.meta.upstream, 2);
    let error = expired.meta.upstream_error.as_deref().unwrap();
    assert!(error.contains("Upstream unavailable"));
}

#[tokio::test]
async fn test_cold_outage_is_not_memoized() {
    let upstream = ScriptedUpstream::new(Vec::new());
    upstream.fail();
    let h = harness(upstream, InMemoryRecordSource::new());

    let outage = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
    assert!(outage.elements.is_empty());
    assert!(outage.meta.upstream_error.is_some());

    h.upstream.set_elements(two_nodes());
    let recovered = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    assert!(!recovered.meta.snapshot_cached);
    assert_eq!(recovered.meta.total, 2);
    assert!(recovered.meta.upstream_error.is_none());
    assert_eq!(h.upstream.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_cold_requests_share_one_fetch() {
    const CALLERS: u64 = 10;

    let upstream = ScriptedUpstream::new(two_nodes());
    let gate = upstream.close_gate();
    let h = harness(upstream, InMemoryRecordSource::new());

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let pipeline = Arc::clone(&h.pipeline);
            tokio::spawn(async move { pipeline.get_merged_elements(Some(BBOX)).await })
        })
        .collect();

    while h.pipeline.stats().total_requests < CALLERS {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    gate.add_permits(1);

    for joined in futures::future::join_all(handles).await {
        let result = joined.unwrap().unwrap();
        assert_eq!(result.meta.total, 2);
        assert!(result.meta.upstream_error.is_none());
    }

    let stats = h.pipeline.stats();
    assert_eq!(h.upstream.calls(), 1);
    assert_eq!(stats.fetches_started, 1);
    assert_eq!(stats.coalesced_requests, CALLERS - 1);
}

#[tokio::test]
async fn test_stale_response_does_not_wait_for_revalidation() {
    let h = harness(
        ScriptedUpstream::new(two_nodes()),
        InMemoryRecordSource::new(),
    );
    h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    let gate = h.upstream.close_gate();
    let mut refreshed = two_nodes();
    refreshed.push(node(3, 37.07, 127.08, "Night Market"));
    h.upstream.set_elements(refreshed);
    h.clock.advance(Duration::from_secs(301));

    // The gate is closed, so this only returns because it does not await the fetch.
    let stale = tokio::time::timeout(
        Duration::from_secs(5),
        h.pipeline.get_merged_elements(Some(BBOX)),
    )
    .await
    .expect("stale response must not wait for the upstream")
    .unwrap();
    assert!(stale.meta.stale);
    assert!(stale.meta.revalidating);
    assert_eq!(stale.meta.total, 2);

    gate.add_permits(1);
    h.pipeline.shutdown().await;
    assert_eq!(h.pipeline.stats().fetches_succeeded, 2);

    // Outlive the snapshot written by the stale request.
    h.clock.advance(Duration::from_secs(61));
    let fresh = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    assert!(fresh.meta.cached);
    assert!(!fresh.meta.stale);
    assert_eq!(fresh.meta.total, 3);
    assert_eq!(h.upstream.calls(), 2);
}

#[tokio::test]
async fn test_timed_out_request_does_not_cancel_revalidation() {
    let upstream = ScriptedUpstream::new(two_nodes());
    let gate = upstream.close_gate();
    let h = harness(upstream, InMemoryRecordSource::new());
    let key = region_to_cache_key(&parse_region(BBOX).unwrap(), 2);

    // The caller gives up while the fetch is held at the gate.
    let timed_out = tokio::time::timeout(
        Duration::from_millis(50),
        h.pipeline.get_merged_elements(Some(BBOX)),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(h.pipeline.raw_store().get(&key).await.unwrap().is_none());

    gate.add_permits(1);
    h.pipeline.shutdown().await;

    let entry = h.pipeline.raw_store().get(&key).await.unwrap().unwrap();
    assert_eq!(entry.elements().len(), 2);
    assert_eq!(h.pipeline.stats().fetches_succeeded, 1);

    // The next caller finds the entry the abandoned request paid for.
    let result = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();
    assert!(result.meta.cached);
    assert!(!result.meta.stale);
    assert_eq!(result.meta.total, 2);
    assert_eq!(h.upstream.calls(), 1);
}

#[tokio::test]
async fn test_bad_record_rows_do_not_fail_the_request() {
    let dir = tempfile::TempDir::new().unwrap();
    let curated_path = dir.path().join("curated.json");
    std::fs::write(
        &curated_path,
        r#"[
            {"id":"1","name":"Lighthouse Gallery","lat":37.03,"lon":127.03},
            {"id":"2","name":"Unplaced","lat":null,"lon":127.04}
        ]"#,
    )
    .unwrap();
    let community_path = dir.path().join("community.json");
    std::fs::write(
        &community_path,
        r#"[{"id":12,"name":"Blossom Alley","lat":37.08,"lon":127.08,"memo":"full bloom"}]"#,
    )
    .unwrap();
    let records = InMemoryRecordSource::from_files(Some(&curated_path), None, Some(&community_path))
        .await
        .unwrap();
    let h = harness(ScriptedUpstream::new(two_nodes()), records);

    let result = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    assert_eq!(result.meta.curated, 1);
    assert_eq!(result.meta.community, 1);
    assert_eq!(result.meta.total, 4);
    assert!(result
        .elements
        .iter()
        .any(|e| e.id().to_string() == "community-12"));
}

#[tokio::test]
async fn test_invalidate_all_forces_refetch() {
    let h = harness(
        ScriptedUpstream::new(two_nodes()),
        InMemoryRecordSource::new(),
    );
    h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    h.pipeline.invalidate_all().await.unwrap();
    let result = h.pipeline.get_merged_elements(Some(BBOX)).await.unwrap();

    assert!(!result.meta.snapshot_cached);
    assert!(!result.meta.cached);
    assert_eq!(h.upstream.calls(), 2);
}

#[tokio::test]
async fn test_malformed_region_is_rejected_without_fetching() {
    let h = harness(
        ScriptedUpstream::new(two_nodes()),
        InMemoryRecordSource::new(),
    );

    let err = h
        .pipeline
        .get_merged_elements(Some("127.0,37.0,north"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("invalid region"));
    assert_eq!(h.upstream.calls(), 0);
}
