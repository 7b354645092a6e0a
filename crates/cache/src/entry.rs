use crate::key::CacheKey;
use adops_core::MetricRow;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Freshness tier of an entry relative to a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Fresh,
    Stale,
    Expired,
}

pub(crate) struct CacheEntry {
    pub key: CacheKey,
    pub data: Arc<[MetricRow]>,
    pub fetched_at: Instant,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn new(
        key: CacheKey,
        data: Arc<[MetricRow]>,
        fetched_at: Instant,
        stale_ttl: Duration,
    ) -> Self {
        Self {
            key,
            data,
            fetched_at,
            expires_at: fetched_at + stale_ttl,
        }
    }

    pub fn state(&self, now: Instant, fresh_ttl: Duration) -> EntryState {
        if now > self.expires_at {
            EntryState::Expired
        } else if now.saturating_duration_since(self.fetched_at) <= fresh_ttl {
            EntryState::Fresh
        } else {
            EntryState::Stale
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    /// Rough byte footprint: canonical key plus the JSON form of the rows.
    pub fn estimated_size(&self, cache_key: &str) -> usize {
        let rows = serde_json::to_vec(&*self.data).map(|v| v.len()).unwrap_or(0);
        cache_key.len() + rows
    }
}
