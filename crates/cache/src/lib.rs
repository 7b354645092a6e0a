//! In-process metrics cache: stale-while-revalidate reads over a pluggable
//! metrics source, with per-key fetch coalescing and periodic cleanup.

pub mod entry;
pub mod key;
pub mod metrics_cache;
pub mod source;
pub mod stats;

pub use entry::EntryState;
pub use key::{CacheKey, KeyFilter};
pub use metrics_cache::{MetricRows, MetricsCache};
pub use source::{JsonFileSource, MetricsSource};
pub use stats::{CacheStats, PreloadSummary};
