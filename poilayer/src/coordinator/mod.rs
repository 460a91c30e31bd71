//! Single-flight revalidation of raw cache entries.
//!
//! At most one upstream fetch runs per [`CacheKey`] at any time. Callers
//! that arrive while a fetch is in flight attach to it and receive the same
//! outcome, success or failure.
//!
//! # Architecture
//!
//! ```text
//! Request A ─┐
//!            │                                   Upstream
//! Request B ─┼──► RevalidationCoordinator ──────► fetch
//!            │        │ in_flight[key]              │
//! Request C ─┘        │                             ▼
//!                     ▼                       RawCacheStore::put
//!               [A, B, C receive  ◄──────────── broadcast
//!                the same outcome]
//! ```
//!
//! The fetch itself runs on a tracked task owned by the coordinator, not on
//! the caller's task. Dropping a waiting caller never cancels the fetch, and
//! [`RevalidationCoordinator::revalidate_in_background`] simply never waits.
//!
//! The in-flight marker is removed after the entry has been stored and
//! before the outcome is published, so the next revalidation for the same
//! key always observes the previous write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, RawCacheStore, TtlPolicy};
use crate::provider::{ProviderError, Upstream};
use crate::query::UpstreamQuery;
use crate::region::CacheKey;
use crate::time::Clock;

/// Why a revalidation produced no entry.
///
/// `Clone` so a single outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RevalidateError {
    /// Every upstream endpoint failed.
    #[error("{0}")]
    Upstream(#[from] ProviderError),

    /// The fetched entry could not be written to the raw cache.
    #[error("failed to store revalidated entry: {0}")]
    Store(String),

    /// The fetch task ended without publishing a result.
    #[error("revalidation ended without a result")]
    Abandoned,
}

/// Outcome shared by every caller attached to one revalidation.
pub type RevalidateOutcome = Result<Arc<CacheEntry>, RevalidateError>;

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Revalidations requested, waited or not
    pub total_requests: u64,
    /// Requests that attached to an in-flight fetch
    pub coalesced_requests: u64,
    /// Upstream fetches started
    pub fetches_started: u64,
    /// Fetches whose entry was stored
    pub fetches_succeeded: u64,
    /// Fetches that failed upstream or at the store
    pub fetches_failed: u64,
}

impl CoordinatorStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    fetches_started: AtomicU64,
    fetches_succeeded: AtomicU64,
    fetches_failed: AtomicU64,
}

type InFlight = DashMap<CacheKey, broadcast::Sender<RevalidateOutcome>>;

/// Removes the in-flight marker when the fetch task ends, including when
/// it panics.
struct InFlightGuard {
    in_flight: Arc<InFlight>,
    key: CacheKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

/// Coalescing barrier keyed by [`CacheKey`].
///
/// Callers that do not need a revalidation never touch the barrier, so it
/// never blocks a cache read.
pub struct RevalidationCoordinator<U> {
    upstream: Arc<U>,
    store: Arc<RawCacheStore>,
    clock: Arc<dyn Clock>,
    in_flight: Arc<InFlight>,
    tracker: TaskTracker,
    counters: Arc<Counters>,
}

impl<U: Upstream + 'static> RevalidationCoordinator<U> {
    /// Creates a coordinator writing to `store`.
    pub fn new(upstream: Arc<U>, store: Arc<RawCacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            upstream,
            store,
            clock,
            in_flight: Arc::new(DashMap::new()),
            tracker: TaskTracker::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Revalidates `key` and waits for the outcome.
    ///
    /// Attaches to an in-flight fetch for the same key if there is one.
    /// On success the new entry has already been stored when this returns.
    ///
    /// # Errors
    ///
    /// The shared fetch's error; nothing is written in that case.
    pub async fn revalidate(
        &self,
        key: CacheKey,
        query: UpstreamQuery,
        policy: TtlPolicy,
    ) -> RevalidateOutcome {
        let mut rx = self.join_or_start(key, query, policy);
        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(RevalidateError::Abandoned),
        }
    }

    /// Starts (or joins) a revalidation of `key` without waiting for it.
    ///
    /// Failures are logged by the fetch task and never reach the caller.
    pub fn revalidate_in_background(&self, key: CacheKey, query: UpstreamQuery, policy: TtlPolicy) {
        drop(self.join_or_start(key, query, policy));
    }

    /// Subscribes to the in-flight fetch for `key`, starting one if needed.
    fn join_or_start(
        &self,
        key: CacheKey,
        query: UpstreamQuery,
        policy: TtlPolicy,
    ) -> broadcast::Receiver<RevalidateOutcome> {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);

        // The entry guard holds a shard lock; release it before spawning.
        let tx = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.counters
                    .coalesced_requests
                    .fetch_add(1, Ordering::Relaxed);
                debug!(
                    cache_key = %key,
                    waiters = entry.get().receiver_count() + 1,
                    "Joining in-flight revalidation"
                );
                return entry.get().subscribe();
            }
            Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                entry.insert(tx.clone());
                tx
            }
        };

        let rx = tx.subscribe();
        self.counters.fetches_started.fetch_add(1, Ordering::Relaxed);
        debug!(
            cache_key = %key,
            upstream = self.upstream.name(),
            in_flight = self.in_flight.len(),
            "Starting revalidation"
        );

        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key: key.clone(),
        };
        let upstream = Arc::clone(&self.upstream);
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let counters = Arc::clone(&self.counters);

        self.tracker.spawn(async move {
            let outcome = fetch_and_store(&*upstream, &store, &*clock, key.clone(), &query, policy).await;

            drop(guard);

            match &outcome {
                Ok(entry) => {
                    counters.fetches_succeeded.fetch_add(1, Ordering::Relaxed);
                    info!(
                        cache_key = %key,
                        elements = entry.elements().len(),
                        waiters = tx.receiver_count(),
                        "Revalidation complete"
                    );
                }
                Err(e) => {
                    counters.fetches_failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        cache_key = %key,
                        error = %e,
                        waiters = tx.receiver_count(),
                        "Revalidation failed"
                    );
                }
            }

            // No receivers left is fine: background revalidations never wait.
            let _ = tx.send(outcome);
        });

        rx
    }

    /// Returns true if a fetch for `key` is currently running.
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Returns the number of currently in-flight fetches.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            total_requests: self.counters.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.counters.coalesced_requests.load(Ordering::Relaxed),
            fetches_started: self.counters.fetches_started.load(Ordering::Relaxed),
            fetches_succeeded: self.counters.fetches_succeeded.load(Ordering::Relaxed),
            fetches_failed: self.counters.fetches_failed.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            fetches_started = stats.fetches_started,
            fetches_succeeded = stats.fetches_succeeded,
            fetches_failed = stats.fetches_failed,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Revalidation statistics"
        );
    }

    /// Waits for every running fetch, including background ones, to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

async fn fetch_and_store<U: Upstream>(
    upstream: &U,
    store: &RawCacheStore,
    clock: &dyn Clock,
    key: CacheKey,
    query: &UpstreamQuery,
    policy: TtlPolicy,
) -> RevalidateOutcome {
    let elements = upstream.fetch(query).await?;
    let entry = CacheEntry::new(key, elements, clock.now_ms(), policy);
    store
        .put(&entry)
        .await
        .map_err(|e| RevalidateError::Store(e.to_string()))?;
    Ok(Arc::new(entry))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::MemoryCacheProvider;
    use crate::element::{Element, ElementType};
    use crate::query::QueryBuilder;
    use crate::region::Region;
    use crate::time::ManualClock;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    /// Scripted upstream counting its fetches.
    ///
    /// With a gate, every fetch waits for a permit, which lets tests pile up
    /// concurrent callers before the fetch completes.
    pub struct MockUpstream {
        result: parking_lot::Mutex<Result<Vec<Element>, ProviderError>>,
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
    }

    impl MockUpstream {
        pub fn returning(elements: Vec<Element>) -> Self {
            Self {
                result: parking_lot::Mutex::new(Ok(elements)),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        pub fn failing() -> Self {
            let upstream = Self::returning(Vec::new());
            upstream.set_result(Err(unavailable()));
            upstream
        }

        pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }

        pub fn set_result(&self, result: Result<Vec<Element>, ProviderError>) {
            *self.result.lock() = result;
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Upstream for MockUpstream {
        async fn fetch(&self, _query: &UpstreamQuery) -> Result<Vec<Element>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await;
            }
            self.result.lock().clone()
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    pub fn unavailable() -> ProviderError {
        ProviderError::UpstreamUnavailable {
            attempts: 2,
            last_error: Box::new(ProviderError::HttpError("HTTP 504".to_string())),
        }
    }

    pub fn upstream_element(id: u64, lat: f64, lon: f64, name: &str) -> Element {
        let mut tags = BTreeMap::new();
        tags.insert("name".to_string(), name.to_string());
        Element::from_upstream(ElementType::Node, id, lat, lon, tags).unwrap()
    }

    fn setup(
        upstream: MockUpstream,
    ) -> (
        RevalidationCoordinator<MockUpstream>,
        Arc<MockUpstream>,
        Arc<RawCacheStore>,
    ) {
        let upstream = Arc::new(upstream);
        let store = Arc::new(RawCacheStore::new(Arc::new(MemoryCacheProvider::new(
            1_000_000, None,
        ))));
        let coordinator = RevalidationCoordinator::new(
            Arc::clone(&upstream),
            Arc::clone(&store),
            Arc::new(ManualClock::new(1_000)),
        );
        (coordinator, upstream, store)
    }

    fn query() -> UpstreamQuery {
        QueryBuilder::default().build(&Region::Territory)
    }

    #[tokio::test]
    async fn test_revalidate_stores_entry() {
        let (coordinator, upstream, store) =
            setup(MockUpstream::returning(vec![upstream_element(1, 37.0, 127.0, "A")]));

        let entry = coordinator
            .revalidate(CacheKey::territory(), query(), TtlPolicy::territory())
            .await
            .unwrap();

        assert_eq!(entry.elements().len(), 1);
        assert_eq!(entry.updated_at_ms(), 1_000);
        assert_eq!(upstream.call_count(), 1);

        let stored = store.get(&CacheKey::territory()).await.unwrap().unwrap();
        assert_eq!(stored, *entry);
        assert!(!coordinator.is_in_flight(&CacheKey::territory()));
    }

    #[tokio::test]
    async fn test_failure_writes_nothing_and_clears_marker() {
        let (coordinator, upstream, store) = setup(MockUpstream::failing());

        let err = coordinator
            .revalidate(CacheKey::territory(), query(), TtlPolicy::territory())
            .await
            .unwrap_err();

        assert_eq!(err, RevalidateError::Upstream(unavailable()));
        assert!(store.get(&CacheKey::territory()).await.unwrap().is_none());
        assert_eq!(coordinator.in_flight_count(), 0);

        // A later call may retry
        upstream.set_result(Ok(vec![]));
        assert!(coordinator
            .revalidate(CacheKey::territory(), query(), TtlPolicy::territory())
            .await
            .is_ok());
        assert_eq!(upstream.call_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let gate = Arc::new(Semaphore::new(0));
        let (coordinator, upstream, _store) = setup(
            MockUpstream::returning(vec![upstream_element(1, 37.0, 127.0, "A")])
                .gated(Arc::clone(&gate)),
        );
        let coordinator = Arc::new(coordinator);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator
                    .revalidate(CacheKey::territory(), query(), TtlPolicy::territory())
                    .await
            }));
        }

        while coordinator.stats().total_requests < 8 {
            tokio::task::yield_now().await;
        }
        gate.add_permits(1);

        for handle in handles {
            let entry = handle.await.unwrap().unwrap();
            assert_eq!(entry.elements().len(), 1);
        }

        assert_eq!(upstream.call_count(), 1);
        let stats = coordinator.stats();
        assert_eq!(stats.fetches_started, 1);
        assert_eq!(stats.coalesced_requests, 7);
        assert_eq!(stats.fetches_succeeded, 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_failure() {
        let gate = Arc::new(Semaphore::new(0));
        let (coordinator, upstream, _store) =
            setup(MockUpstream::failing().gated(Arc::clone(&gate)));
        let coordinator = Arc::new(coordinator);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator
                    .revalidate(CacheKey::territory(), query(), TtlPolicy::territory())
                    .await
            }));
        }

        while coordinator.stats().total_requests < 4 {
            tokio::task::yield_now().await;
        }
        gate.add_permits(1);

        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Err(RevalidateError::Upstream(_))
            ));
        }
        assert_eq!(upstream.call_count(), 1);
        assert_eq!(coordinator.stats().fetches_failed, 1);
    }

    #[tokio::test]
    async fn test_background_revalidation_survives_and_drains() {
        let (coordinator, upstream, store) =
            setup(MockUpstream::returning(vec![upstream_element(1, 37.0, 127.0, "A")]));

        coordinator.revalidate_in_background(CacheKey::territory(), query(), TtlPolicy::territory());
        coordinator.drain().await;

        assert_eq!(upstream.call_count(), 1);
        assert!(store.get(&CacheKey::territory()).await.unwrap().is_some());

        // The tracker accepts new work after a drain
        coordinator.revalidate_in_background(CacheKey::territory(), query(), TtlPolicy::territory());
        coordinator.drain().await;
        assert_eq!(upstream.call_count(), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_independently() {
        let (coordinator, upstream, _store) = setup(MockUpstream::returning(vec![]));

        let other = crate::region::region_to_cache_key(
            &crate::region::parse_region("127.0,37.0,127.1,37.1").unwrap(),
            2,
        );
        let (a, b) = tokio::join!(
            coordinator.revalidate(CacheKey::territory(), query(), TtlPolicy::territory()),
            coordinator.revalidate(other, query(), TtlPolicy::bbox()),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(upstream.call_count(), 2);
    }

    #[test]
    fn test_coalescing_ratio() {
        let stats = CoordinatorStats {
            total_requests: 4,
            coalesced_requests: 3,
            ..Default::default()
        };
        assert!((stats.coalescing_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CoordinatorStats::default().coalescing_ratio(), 0.0);
    }
}
