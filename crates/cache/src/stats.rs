use serde::Serialize;

/// Point-in-time view over the cache contents and its hit counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub stale_entries: usize,
    pub expired_entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0.0 before the first lookup.
    pub cache_hit_rate: f64,
    /// Estimated bytes held by keys and serialized rows.
    pub memory_usage: usize,
}

pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total > 0 {
        hits as f64 / total as f64
    } else {
        0.0
    }
}

/// Outcome of a [`crate::MetricsCache::preload`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreloadSummary {
    pub succeeded: usize,
    pub failed: usize,
}
