//! Shared domain types, configuration and errors for the ad metrics workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, MetricsCacheConfig};
pub use error::{MetricsError, MetricsResult};
pub use types::{DateRange, EntityType, MetricRow};
