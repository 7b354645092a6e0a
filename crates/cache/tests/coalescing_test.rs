use adops_cache::{CacheKey, MetricsCache, MetricsSource};
use adops_core::{DateRange, EntityType, MetricRow, MetricsCacheConfig, MetricsError, MetricsResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct DelayedMockSource {
    call_count: AtomicUsize,
    delay_ms: u64,
    fail: bool,
}

impl DelayedMockSource {
    fn new(delay_ms: u64) -> Self {
        Self {
            call_count: AtomicUsize::new(0),
            delay_ms,
            fail: false,
        }
    }

    fn new_failing(delay_ms: u64) -> Self {
        Self {
            fail: true,
            ..Self::new(delay_ms)
        }
    }

    fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsSource for DelayedMockSource {
    async fn fetch(&self, key: &CacheKey) -> MetricsResult<Vec<MetricRow>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        if self.fail {
            return Err(MetricsError::Source("upstream returned 503".to_string()));
        }
        Ok(vec![MetricRow {
            entity_id: key.entity_id().to_string(),
            campaign_id: Some(key.entity_id().to_string()),
            adset_id: None,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            impressions: 1_000,
            clicks: 20,
            spend: 100.0,
            conversions: 5.0,
            revenue: 500.0,
        }])
    }
}

fn make_cache(source: Arc<DelayedMockSource>) -> MetricsCache {
    MetricsCache::new(source as Arc<dyn MetricsSource>, &MetricsCacheConfig::default()).unwrap()
}

fn make_key(platform: &str, id: &str) -> CacheKey {
    let range = DateRange::parse("2024-06-01", "2024-06-30").unwrap();
    CacheKey::new(platform, EntityType::Campaign, id, range).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_coalescing_deduplicates_concurrent_gets() {
    let mock = Arc::new(DelayedMockSource::new(50));
    let cache = make_cache(Arc::clone(&mock));

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let c = cache.clone();
            tokio::spawn(async move { c.get(&make_key("meta", "c-1")).await })
        })
        .collect();

    let results: Vec<_> = join_all(tasks).await;

    assert_eq!(mock.call_count(), 1, "expected exactly 1 upstream call");
    for result in &results {
        let rows = result.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].revenue, 500.0);
    }
    assert_eq!(cache.stats().in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_coalesced_callers_share_the_failure() {
    let mock = Arc::new(DelayedMockSource::new_failing(50));
    let cache = make_cache(Arc::clone(&mock));

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let c = cache.clone();
            tokio::spawn(async move { c.get(&make_key("google", "c-1")).await })
        })
        .collect();

    let results: Vec<_> = join_all(tasks).await;

    assert_eq!(mock.call_count(), 1);
    for result in results {
        let err = result.unwrap().unwrap_err();
        assert_eq!(err, MetricsError::Source("upstream returned 503".to_string()));
    }
    assert!(cache.is_empty());
    assert_eq!(cache.stats().in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_fetch_independently() {
    let mock = Arc::new(DelayedMockSource::new(20));
    let cache = make_cache(Arc::clone(&mock));

    let keys = [
        make_key("meta", "c-1"),
        make_key("meta", "c-2"),
        make_key("tiktok", "c-1"),
    ];
    let results = join_all(keys.iter().map(|k| cache.get(k))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(mock.call_count(), 3);
    assert_eq!(cache.len(), 3);
}
