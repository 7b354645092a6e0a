//! Metrics reporting: aggregated summaries, daily trends, period-over-period
//! comparisons, top performers, insight rules and display formatting.

pub mod aggregator;
pub mod format;
pub mod insights;

pub use aggregator::{
    AggregatedMetrics, GroupBy, MetricChange, MetricField, MetricsAggregator, MetricsComparison,
    MetricsTrend, TopPerformer, DEFAULT_TOP_PERFORMERS_LIMIT,
};
pub use insights::performance_insights;
