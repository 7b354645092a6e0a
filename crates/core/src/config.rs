use crate::error::{MetricsError, MetricsResult};
use serde::Deserialize;
use std::time::Duration;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `ADOPS__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: MetricsCacheConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsCacheConfig {
    /// Entries younger than this are served without revalidation.
    #[serde(default = "default_fresh_ttl_ms")]
    pub fresh_ttl_ms: u64,
    /// Hard expiry measured from fetch completion.
    #[serde(default = "default_stale_ttl_ms")]
    pub stale_ttl_ms: u64,
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_top_performers_limit")]
    pub top_performers_limit: usize,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

fn default_fresh_ttl_ms() -> u64 {
    300_000
}
fn default_stale_ttl_ms() -> u64 {
    600_000
}
fn default_cleanup_interval_ms() -> u64 {
    60_000
}
fn default_top_performers_limit() -> usize {
    10
}
fn default_currency() -> String {
    "USD".to_string()
}
fn default_log_filter() -> String {
    "adops_dashboard=info,adops_cache=info".to_string()
}

impl Default for MetricsCacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl_ms: default_fresh_ttl_ms(),
            stale_ttl_ms: default_stale_ttl_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
        }
    }
}

impl MetricsCacheConfig {
    pub fn fresh_ttl(&self) -> Duration {
        Duration::from_millis(self.fresh_ttl_ms)
    }

    pub fn stale_ttl(&self) -> Duration {
        Duration::from_millis(self.stale_ttl_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub fn validate(&self) -> MetricsResult<()> {
        if self.fresh_ttl_ms == 0 || self.cleanup_interval_ms == 0 {
            return Err(MetricsError::Config(
                "fresh_ttl_ms and cleanup_interval_ms must be positive".to_string(),
            ));
        }
        if self.stale_ttl_ms < self.fresh_ttl_ms {
            return Err(MetricsError::Config(format!(
                "stale_ttl_ms ({}) must not be shorter than fresh_ttl_ms ({})",
                self.stale_ttl_ms, self.fresh_ttl_ms
            )));
        }
        Ok(())
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_performers_limit: default_top_performers_limit(),
            currency: default_currency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment
    /// variables (`ADOPS__CACHE__FRESH_TTL_MS=...`) on top.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("ADOPS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
