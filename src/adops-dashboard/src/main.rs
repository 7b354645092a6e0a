//! AdOps Dashboard: campaign performance report over synced ad-platform metrics.
//!
//! Wires configuration, logging and the metrics cache lifecycle, then prints
//! a JSON report for one entity scope.

use adops_cache::{CacheKey, CacheStats, JsonFileSource, MetricsCache, MetricsSource};
use adops_core::{AppConfig, DateRange, EntityType};
use adops_reporting::format::{format_compact_number, format_currency, format_percentage};
use adops_reporting::{
    AggregatedMetrics, GroupBy, MetricField, MetricsAggregator, MetricsComparison, MetricsTrend,
    TopPerformer,
};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "adops-dashboard")]
#[command(about = "Campaign performance report over synced ad-platform metrics")]
#[command(version)]
struct Cli {
    /// JSON export written by the platform sync jobs
    #[arg(long, env = "ADOPS__INPUT")]
    input: PathBuf,

    /// Optional TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Ad platform (meta, google, tiktok)
    #[arg(long)]
    platform: String,

    #[arg(long, value_enum, default_value_t = EntityArg::Campaign)]
    entity_type: EntityArg,

    #[arg(long)]
    entity_id: String,

    /// First day of the period (YYYY-MM-DD)
    #[arg(long)]
    start: String,

    /// Last day of the period (YYYY-MM-DD)
    #[arg(long)]
    end: String,

    /// First day of the comparison period
    #[arg(long, requires = "compare_end")]
    compare_start: Option<String>,

    /// Last day of the comparison period
    #[arg(long, requires = "compare_start")]
    compare_end: Option<String>,

    #[arg(long, value_enum, default_value_t = GroupArg::EntityId)]
    group_by: GroupArg,

    #[arg(long, value_enum, default_value_t = SortArg::Revenue)]
    sort_by: SortArg,

    /// Number of top performers (overrides config)
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EntityArg {
    Campaign,
    Adset,
    Ad,
}

impl From<EntityArg> for EntityType {
    fn from(arg: EntityArg) -> Self {
        match arg {
            EntityArg::Campaign => EntityType::Campaign,
            EntityArg::Adset => EntityType::AdSet,
            EntityArg::Ad => EntityType::Ad,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GroupArg {
    EntityId,
    CampaignId,
    AdsetId,
}

impl From<GroupArg> for GroupBy {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::EntityId => GroupBy::EntityId,
            GroupArg::CampaignId => GroupBy::CampaignId,
            GroupArg::AdsetId => GroupBy::AdsetId,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    Impressions,
    Clicks,
    Spend,
    Conversions,
    Revenue,
    Ctr,
    Roas,
}

impl From<SortArg> for MetricField {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Impressions => MetricField::Impressions,
            SortArg::Clicks => MetricField::Clicks,
            SortArg::Spend => MetricField::Spend,
            SortArg::Conversions => MetricField::Conversions,
            SortArg::Revenue => MetricField::Revenue,
            SortArg::Ctr => MetricField::Ctr,
            SortArg::Roas => MetricField::Roas,
        }
    }
}

#[derive(Serialize)]
struct FormattedSummary {
    spend: String,
    revenue: String,
    impressions: String,
    ctr: String,
    roas: String,
}

#[derive(Serialize)]
struct Report {
    key: String,
    summary: AggregatedMetrics,
    formatted: FormattedSummary,
    trend: Vec<MetricsTrend>,
    comparison: Option<MetricsComparison>,
    top_performers: Vec<TopPerformer>,
    insights: Vec<String>,
    cache: CacheStats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter.clone().into());
    // Logs go to stderr so stdout carries only the report.
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!(
        fresh_ttl_ms = config.cache.fresh_ttl_ms,
        stale_ttl_ms = config.cache.stale_ttl_ms,
        cleanup_interval_ms = config.cache.cleanup_interval_ms,
        "Configuration loaded"
    );

    let source: Arc<dyn MetricsSource> = Arc::new(JsonFileSource::new(&cli.input));
    let cache = MetricsCache::new(source, &config.cache)?;
    cache.start_cleanup_schedule();

    let entity_type = EntityType::from(cli.entity_type);
    let key = CacheKey::new(
        &cli.platform,
        entity_type,
        &cli.entity_id,
        DateRange::parse(&cli.start, &cli.end)?,
    )?;
    let previous_key = match (&cli.compare_start, &cli.compare_end) {
        (Some(start), Some(end)) => Some(CacheKey::new(
            &cli.platform,
            entity_type,
            &cli.entity_id,
            DateRange::parse(start, end)?,
        )?),
        _ => None,
    };

    let mut warm = vec![key.clone()];
    warm.extend(previous_key.clone());
    let preload = cache.preload(&warm).await;
    if preload.failed > 0 {
        warn!(failed = preload.failed, "Some metrics could not be preloaded");
    }

    // Served from the cache warmed above.
    let rows = cache.get(&key).await?;
    let summary = MetricsAggregator::aggregate(&rows);

    let comparison = match &previous_key {
        Some(previous_key) => {
            let previous = cache.get(previous_key).await?;
            Some(MetricsAggregator::compare(&rows, &previous))
        }
        None => None,
    };

    let limit = cli.limit.unwrap_or(config.report.top_performers_limit);
    let top_performers =
        MetricsAggregator::top_performers(&rows, cli.group_by.into(), cli.sort_by.into(), limit);

    let report = Report {
        key: key.canonical(),
        formatted: FormattedSummary {
            spend: format_currency(summary.spend, &config.report.currency),
            revenue: format_currency(summary.revenue, &config.report.currency),
            impressions: format_compact_number(summary.impressions as f64),
            ctr: format_percentage(summary.ctr, 2),
            roas: format!("{:.2}x", summary.roas),
        },
        trend: MetricsAggregator::generate_trend(&rows),
        insights: MetricsAggregator::performance_insights(&summary),
        summary,
        comparison,
        top_performers,
        cache: cache.stats(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    cache.dispose();
    info!("Report complete");
    Ok(())
}
