//! Stale-while-revalidate cache in front of the metrics source.
//!
//! Entries move through three tiers measured from fetch completion:
//! fresh (served as is), stale (served, refreshed in the background) and
//! expired (dropped, caller waits for a new fetch). Every fetch for a given
//! canonical key goes through the in-flight registry, so at most one
//! request per key reaches the source at any time and every caller that
//! joins observes the same outcome.

use crate::entry::{CacheEntry, EntryState};
use crate::key::{CacheKey, KeyFilter};
use crate::source::MetricsSource;
use crate::stats::{hit_rate, CacheStats, PreloadSummary};
use adops_core::{MetricRow, MetricsCacheConfig, MetricsError, MetricsResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub type MetricRows = Arc<[MetricRow]>;

type FetchOutcome = MetricsResult<MetricRows>;
type FetchReceiver = watch::Receiver<Option<FetchOutcome>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchTrigger {
    Miss,
    Revalidate,
    Refresh,
}

impl FetchTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            FetchTrigger::Miss => "miss",
            FetchTrigger::Revalidate => "revalidate",
            FetchTrigger::Refresh => "refresh",
        }
    }
}

struct InFlight {
    id: u64,
    rx: FetchReceiver,
}

/// Releases the registry slot when the fetch task ends, panics included.
/// Only the slot registered by this fetch is released: after `clear()` a
/// newer fetch may already own the key.
struct InFlightGuard {
    inner: Arc<CacheInner>,
    cache_key: String,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .remove_if(&self.cache_key, |_, f| f.id == self.id);
    }
}

struct CacheInner {
    source: Arc<dyn MetricsSource>,
    entries: DashMap<String, CacheEntry>,
    in_flight: DashMap<String, InFlight>,
    fresh_ttl: Duration,
    stale_ttl: Duration,
    cleanup_interval: Duration,
    next_fetch_id: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl CacheInner {
    fn join_or_start_fetch(
        self: &Arc<Self>,
        key: &CacheKey,
        cache_key: String,
        trigger: FetchTrigger,
    ) -> FetchReceiver {
        let (id, tx, rx) = match self.in_flight.entry(cache_key.clone()) {
            Entry::Occupied(e) => {
                metrics::counter!("metrics_cache.coalesced").increment(1);
                debug!(
                    key = %cache_key,
                    trigger = trigger.as_str(),
                    "Joined in-flight metrics fetch"
                );
                return e.get().rx.clone();
            }
            Entry::Vacant(e) => {
                let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                e.insert(InFlight { id, rx: rx.clone() });
                (id, tx, rx)
            }
        };

        let guard = InFlightGuard {
            inner: Arc::clone(self),
            cache_key,
            id,
        };
        tokio::spawn(Arc::clone(self).run_fetch(key.clone(), guard, trigger, tx));
        rx
    }

    async fn run_fetch(
        self: Arc<Self>,
        key: CacheKey,
        guard: InFlightGuard,
        trigger: FetchTrigger,
        tx: watch::Sender<Option<FetchOutcome>>,
    ) {
        metrics::counter!("metrics_cache.fetch").increment(1);
        let started = Instant::now();
        let outcome: FetchOutcome = self.source.fetch(&key).await.map(MetricRows::from);

        match &outcome {
            Ok(rows) => {
                debug!(
                    key = %guard.cache_key,
                    trigger = trigger.as_str(),
                    rows = rows.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Metrics fetch complete"
                );
                let entry = CacheEntry::new(key, Arc::clone(rows), Instant::now(), self.stale_ttl);
                self.entries.insert(guard.cache_key.clone(), entry);
            }
            Err(e) => {
                metrics::counter!("metrics_cache.fetch_error").increment(1);
                if trigger == FetchTrigger::Revalidate {
                    warn!(key = %guard.cache_key, error = %e, "Background metrics refresh failed");
                } else {
                    debug!(
                        key = %guard.cache_key,
                        trigger = trigger.as_str(),
                        error = %e,
                        "Metrics fetch failed"
                    );
                }
            }
        }

        // Registry slot goes first so a caller arriving now sees the new entry
        // instead of joining a finished fetch.
        drop(guard);
        tx.send_replace(Some(outcome));
    }

    fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut evicted = 0usize;
        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                evicted += 1;
                false
            } else {
                true
            }
        });
        if evicted > 0 {
            metrics::counter!("metrics_cache.evicted").increment(evicted as u64);
            debug!(evicted = evicted, "Metrics cache eviction complete");
        }
        evicted
    }
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup.get_mut().take() {
            handle.abort();
        }
    }
}

async fn await_outcome(mut rx: FetchReceiver) -> FetchOutcome {
    loop {
        let current = rx.borrow_and_update().clone();
        if let Some(outcome) = current {
            return outcome;
        }
        if rx.changed().await.is_err() {
            let last = rx.borrow().clone();
            return last.unwrap_or_else(|| {
                Err(MetricsError::FetchAborted(
                    "fetch task ended without a result".to_string(),
                ))
            });
        }
    }
}

/// Cheap to clone; all clones share the same entries and registry.
#[derive(Clone)]
pub struct MetricsCache {
    inner: Arc<CacheInner>,
}

impl MetricsCache {
    pub fn new(source: Arc<dyn MetricsSource>, config: &MetricsCacheConfig) -> MetricsResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(CacheInner {
                source,
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                fresh_ttl: config.fresh_ttl(),
                stale_ttl: config.stale_ttl(),
                cleanup_interval: config.cleanup_interval(),
                next_fetch_id: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                cleanup: Mutex::new(None),
            }),
        })
    }

    /// Read-through lookup.
    ///
    /// Fresh entries are returned as is. Stale entries are returned and a
    /// background refresh is started (or joined); its failure is logged and
    /// never reaches the caller. Missing or expired entries make the caller
    /// wait for a fetch, whose error is returned unchanged.
    pub async fn get(&self, key: &CacheKey) -> MetricsResult<MetricRows> {
        let cache_key = key.canonical();
        let now = Instant::now();
        let cached = self
            .inner
            .entries
            .get(&cache_key)
            .map(|e| (e.state(now, self.inner.fresh_ttl), Arc::clone(&e.data)));

        match cached {
            Some((EntryState::Fresh, data)) => {
                self.record_hit();
                debug!(key = %cache_key, "Metrics cache HIT");
                return Ok(data);
            }
            Some((EntryState::Stale, data)) => {
                self.record_hit();
                debug!(key = %cache_key, "Metrics cache STALE, revalidating");
                self.inner
                    .join_or_start_fetch(key, cache_key, FetchTrigger::Revalidate);
                return Ok(data);
            }
            Some((EntryState::Expired, _)) => {
                self.inner
                    .entries
                    .remove_if(&cache_key, |_, e| e.is_expired(now));
                debug!(key = %cache_key, "Metrics cache entry expired");
            }
            None => {}
        }

        self.record_miss();
        debug!(key = %cache_key, "Metrics cache MISS");
        let rx = self
            .inner
            .join_or_start_fetch(key, cache_key, FetchTrigger::Miss);
        await_outcome(rx).await
    }

    /// Fetch regardless of the entry's freshness, joining any fetch already
    /// running for the key.
    pub async fn refresh(&self, key: &CacheKey) -> MetricsResult<MetricRows> {
        let rx = self
            .inner
            .join_or_start_fetch(key, key.canonical(), FetchTrigger::Refresh);
        await_outcome(rx).await
    }

    pub fn entry_state(&self, key: &CacheKey) -> Option<EntryState> {
        let now = Instant::now();
        self.inner
            .entries
            .get(&key.canonical())
            .map(|e| e.state(now, self.inner.fresh_ttl))
    }

    /// Drop every entry whose key matches all fields set on `filter`.
    pub fn invalidate(&self, filter: &KeyFilter) -> usize {
        let mut removed = 0usize;
        self.inner.entries.retain(|_, entry| {
            if filter.matches(&entry.key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        debug!(removed = removed, filter = ?filter, "Metrics cache invalidated");
        removed
    }

    /// Drop all entries and forget in-flight fetches. Fetches already running
    /// are not cancelled: when one completes it stores its result again.
    pub fn clear(&self) {
        self.inner.entries.clear();
        self.inner.in_flight.clear();
        info!("Metrics cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut stats = CacheStats::default();
        for item in self.inner.entries.iter() {
            stats.total_entries += 1;
            match item.value().state(now, self.inner.fresh_ttl) {
                EntryState::Fresh => stats.fresh_entries += 1,
                EntryState::Stale => stats.stale_entries += 1,
                EntryState::Expired => stats.expired_entries += 1,
            }
            stats.memory_usage += item.value().estimated_size(item.key());
        }
        stats.in_flight = self.inner.in_flight.len();
        stats.hits = self.inner.hits.load(Ordering::Relaxed);
        stats.misses = self.inner.misses.load(Ordering::Relaxed);
        stats.cache_hit_rate = hit_rate(stats.hits, stats.misses);
        stats
    }

    /// Warm the cache for several keys concurrently. Each key settles on
    /// its own; a failing key does not stop the others.
    pub async fn preload(&self, keys: &[CacheKey]) -> PreloadSummary {
        let results = futures::future::join_all(keys.iter().map(|key| self.get(key))).await;

        let mut summary = PreloadSummary::default();
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(key = %key, error = %e, "Failed to preload metrics");
                }
            }
        }
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Metrics preload complete"
        );
        summary
    }

    pub fn evict_expired(&self) -> usize {
        self.inner.evict_expired()
    }

    /// Start the periodic sweep of expired entries. Calling it again while
    /// the schedule runs is a no-op.
    pub fn start_cleanup_schedule(&self) {
        let mut slot = self.inner.cleanup.lock();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let period = self.inner.cleanup_interval;
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.evict_expired();
            }
        }));
        info!(interval_ms = period.as_millis() as u64, "Metrics cache cleanup schedule started");
    }

    pub fn stop_cleanup_schedule(&self) {
        if let Some(handle) = self.inner.cleanup.lock().take() {
            handle.abort();
            info!("Metrics cache cleanup schedule stopped");
        }
    }

    /// Stop the cleanup schedule and drop all cached state.
    pub fn dispose(&self) {
        self.stop_cleanup_schedule();
        self.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    fn record_hit(&self) {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("metrics_cache.hit").increment(1);
    }

    fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("metrics_cache.miss").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adops_core::{DateRange, EntityType};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicUsize;

    const MINUTE: Duration = Duration::from_secs(60);

    /// Returns one row whose impressions encode the call number
    /// (`100 * n`), so tests can tell which fetch produced the data.
    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        delay: Duration,
        /// Extra sleep applied only to the given call number.
        slow_call: Option<(usize, Duration)>,
        fail_from_call: Option<usize>,
        fail_entity: Option<String>,
    }

    impl CountingSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetricsSource for CountingSource {
        async fn fetch(&self, key: &CacheKey) -> MetricsResult<Vec<MetricRow>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some((_, pause)) = self.slow_call.filter(|(call, _)| *call == n) {
                tokio::time::sleep(pause).await;
            }
            if self.fail_from_call.is_some_and(|from| n >= from)
                || self.fail_entity.as_deref() == Some(key.entity_id())
            {
                return Err(MetricsError::Source(format!("backend rejected call {n}")));
            }
            Ok(vec![MetricRow {
                entity_id: key.entity_id().to_string(),
                campaign_id: Some(key.entity_id().to_string()),
                adset_id: None,
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                impressions: 100 * n as u64,
                clicks: 10,
                spend: 25.0,
                conversions: 1.0,
                revenue: 80.0,
            }])
        }
    }

    fn key(platform: &str, id: &str) -> CacheKey {
        let range = DateRange::parse("2024-01-01", "2024-01-31").unwrap();
        CacheKey::new(platform, EntityType::Campaign, id, range).unwrap()
    }

    fn cache_with(source: CountingSource) -> (MetricsCache, Arc<CountingSource>) {
        let source = Arc::new(source);
        let cache = MetricsCache::new(
            Arc::clone(&source) as Arc<dyn MetricsSource>,
            &MetricsCacheConfig::default(),
        )
        .unwrap();
        (cache, source)
    }

    /// Lets spawned fetch tasks run to completion on the paused clock.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = MetricsCacheConfig {
            fresh_ttl_ms: 10,
            stale_ttl_ms: 5,
            cleanup_interval_ms: 10,
        };
        let source = Arc::new(CountingSource::default()) as Arc<dyn MetricsSource>;
        assert!(MetricsCache::new(source, &config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_get_within_fresh_window_fetches_once() {
        let (cache, source) = cache_with(CountingSource::default());
        let k = key("meta", "c-1");

        let first = cache.get(&k).await.unwrap();
        tokio::time::advance(4 * MINUTE).await;
        let second = cache.get(&k).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.entry_state(&k), Some(EntryState::Fresh));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.cache_hit_rate - 0.5).abs() < f64::EPSILON);
        assert!(stats.memory_usage > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_gets_share_one_fetch() {
        let (cache, source) = cache_with(CountingSource {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let k = key("meta", "c-1");

        let (a, b) = tokio::join!(cache.get(&k), cache.get(&k));

        assert_eq!(source.calls(), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(cache.stats().in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_served_while_revalidating() {
        let (cache, source) = cache_with(CountingSource::default());
        let k = key("meta", "c-1");
        cache.get(&k).await.unwrap();

        tokio::time::advance(6 * MINUTE).await;
        assert_eq!(cache.entry_state(&k), Some(EntryState::Stale));

        let stale = cache.get(&k).await.unwrap();
        let stale_again = cache.get(&k).await.unwrap();
        assert_eq!(stale[0].impressions, 100);
        assert_eq!(stale_again[0].impressions, 100);

        settle().await;
        assert_eq!(source.calls(), 2, "both stale reads share one background fetch");
        assert_eq!(cache.entry_state(&k), Some(EntryState::Fresh));

        let refreshed = cache.get(&k).await.unwrap();
        assert_eq!(refreshed[0].impressions, 200);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched_synchronously() {
        let (cache, source) = cache_with(CountingSource::default());
        let k = key("meta", "c-1");
        cache.get(&k).await.unwrap();

        tokio::time::advance(11 * MINUTE).await;
        assert_eq!(cache.stats().expired_entries, 1);

        let rows = cache.get(&k).await.unwrap();
        assert_eq!(rows[0].impressions, 200);
        assert_eq!(source.calls(), 2);
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_fetch_error_propagates_and_releases_registry() {
        let (cache, source) = cache_with(CountingSource {
            fail_from_call: Some(1),
            ..Default::default()
        });
        let k = key("google", "c-1");

        let err = cache.get(&k).await.unwrap_err();
        assert!(matches!(err, MetricsError::Source(_)));
        assert_eq!(cache.stats().in_flight, 0);
        assert!(cache.is_empty());

        assert!(cache.get(&k).await.is_err());
        assert_eq!(source.calls(), 2, "no memoised failure, next get fetches again");
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_refresh_failure_keeps_stale_data() {
        let (cache, source) = cache_with(CountingSource {
            fail_from_call: Some(2),
            ..Default::default()
        });
        let k = key("tiktok", "c-1");
        cache.get(&k).await.unwrap();

        tokio::time::advance(6 * MINUTE).await;
        let rows = cache.get(&k).await.unwrap();
        assert_eq!(rows[0].impressions, 100);

        settle().await;
        assert_eq!(source.calls(), 2);
        assert_eq!(cache.entry_state(&k), Some(EntryState::Stale));

        let rows = cache.get(&k).await.unwrap();
        assert_eq!(rows[0].impressions, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_during_background_refresh_joins_running_fetch() {
        let (cache, source) = cache_with(CountingSource {
            slow_call: Some((2, Duration::from_secs(400))),
            ..Default::default()
        });
        let k = key("meta", "c-1");
        cache.get(&k).await.unwrap();

        tokio::time::advance(6 * MINUTE).await;
        let stale = cache.get(&k).await.unwrap();
        assert_eq!(stale[0].impressions, 100);
        settle().await;
        assert_eq!(source.calls(), 2);

        tokio::time::advance(5 * MINUTE).await;
        assert_eq!(cache.entry_state(&k), Some(EntryState::Expired));

        let rows = cache.get(&k).await.unwrap();
        assert_eq!(rows[0].impressions, 200);
        assert_eq!(source.calls(), 2, "expired read joins the running refresh");
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.entry_state(&k), Some(EntryState::Fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_read_joining_failed_refresh_gets_error() {
        let (cache, source) = cache_with(CountingSource {
            slow_call: Some((2, Duration::from_secs(400))),
            fail_from_call: Some(2),
            ..Default::default()
        });
        let k = key("google", "c-1");
        cache.get(&k).await.unwrap();

        tokio::time::advance(6 * MINUTE).await;
        cache.get(&k).await.unwrap();
        settle().await;
        tokio::time::advance(5 * MINUTE).await;

        let err = cache.get(&k).await.unwrap_err();
        assert!(matches!(err, MetricsError::Source(_)));
        assert_eq!(source.calls(), 2);
        assert_eq!(cache.entry_state(&k), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_forces_a_new_fetch() {
        let (cache, source) = cache_with(CountingSource::default());
        let k = key("meta", "c-1");
        cache.get(&k).await.unwrap();

        let rows = cache.refresh(&k).await.unwrap();
        assert_eq!(rows[0].impressions, 200);
        assert_eq!(source.calls(), 2);
        assert_eq!(cache.get(&k).await.unwrap()[0].impressions, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_by_platform_leaves_other_platforms() {
        let (cache, _source) = cache_with(CountingSource::default());
        let meta_a = key("meta", "c-1");
        let meta_b = key("meta", "c-2");
        let google = key("google", "c-1");
        for k in [&meta_a, &meta_b, &google] {
            cache.get(k).await.unwrap();
        }

        let removed = cache.invalidate(&KeyFilter::any().platform("meta"));

        assert_eq!(removed, 2);
        assert_eq!(cache.entry_state(&meta_a), None);
        assert_eq!(cache.entry_state(&meta_b), None);
        assert_eq!(cache.entry_state(&google), Some(EntryState::Fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_by_entity_id_across_platforms() {
        let (cache, _source) = cache_with(CountingSource::default());
        for k in [key("meta", "c-1"), key("google", "c-1"), key("google", "c-2")] {
            cache.get(&k).await.unwrap();
        }

        assert_eq!(cache.invalidate(&KeyFilter::any().entity_id("c-1")), 2);
        assert_eq!(cache.len(), 1);
    }

    // Accepted race: clear() does not cancel a running fetch, whose result
    // lands in the cache after the clear.
    #[tokio::test(start_paused = true)]
    async fn test_clear_does_not_cancel_in_flight_fetch() {
        let (cache, source) = cache_with(CountingSource {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let k = key("meta", "c-1");

        let pending = tokio::spawn({
            let cache = cache.clone();
            let k = k.clone();
            async move { cache.get(&k).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 1);

        cache.clear();
        assert_eq!(cache.stats().in_flight, 0);
        assert!(cache.is_empty());

        assert!(pending.await.unwrap().is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_schedule_evicts_expired_entries() {
        let (cache, _source) = cache_with(CountingSource::default());
        cache.start_cleanup_schedule();
        cache.start_cleanup_schedule();

        cache.get(&key("meta", "c-1")).await.unwrap();
        tokio::time::advance(4 * MINUTE).await;
        settle().await;
        assert_eq!(cache.len(), 1, "fresh entry survives the sweep");

        tokio::time::advance(7 * MINUTE).await;
        settle().await;
        assert!(cache.is_empty());

        cache.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_schedule_leaves_expired_entries() {
        let (cache, _source) = cache_with(CountingSource::default());
        cache.start_cleanup_schedule();
        cache.stop_cleanup_schedule();

        cache.get(&key("meta", "c-1")).await.unwrap();
        tokio::time::advance(11 * MINUTE).await;
        settle().await;

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.expired_entries, 1);

        assert_eq!(cache.evict_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preload_settles_each_key_independently() {
        let (cache, _source) = cache_with(CountingSource {
            fail_entity: Some("broken".to_string()),
            ..Default::default()
        });
        let keys = vec![key("meta", "c-1"), key("meta", "broken"), key("google", "c-3")];

        let summary = cache.preload(&keys).await;

        assert_eq!(summary, PreloadSummary { succeeded: 2, failed: 1 });
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.entry_state(&keys[1]), None);
    }
}
