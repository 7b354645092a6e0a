//! The metrics source port and a file-backed implementation reading the
//! exports written by the ad-platform sync jobs.

use crate::key::CacheKey;
use adops_core::{EntityType, MetricRow, MetricsError, MetricsResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Anything able to produce the daily rows for a cache key. Failures must
/// carry a descriptive message; the cache never retries.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, key: &CacheKey) -> MetricsResult<Vec<MetricRow>>;
}

/// Reads a JSON export shaped as `{ "<platform>": [MetricRow, ...] }` on
/// every fetch.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MetricsSource for JsonFileSource {
    async fn fetch(&self, key: &CacheKey) -> MetricsResult<Vec<MetricRow>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MetricsError::Source(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let export: HashMap<String, Vec<MetricRow>> = serde_json::from_str(&raw)?;

        let rows: Vec<MetricRow> = export
            .into_iter()
            .filter(|(platform, _)| platform.trim().eq_ignore_ascii_case(key.platform()))
            .flat_map(|(_, rows)| rows)
            .filter(|row| row_matches(row, key))
            .collect();

        debug!(
            key = %key,
            rows = rows.len(),
            path = %self.path.display(),
            "Loaded metrics from export"
        );
        Ok(rows)
    }
}

fn row_matches(row: &MetricRow, key: &CacheKey) -> bool {
    let id = key.entity_id();
    let entity_match = match key.entity_type() {
        EntityType::Campaign => row.campaign_id.as_deref() == Some(id),
        EntityType::AdSet => row.adset_id.as_deref() == Some(id),
        EntityType::Ad => row.entity_id == id,
    };
    entity_match && key.date_range().contains(row.date)
}
