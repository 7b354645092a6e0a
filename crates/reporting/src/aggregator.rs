//! Metrics aggregation: summaries, daily trends, period comparisons and
//! top-performer rankings over raw daily rows.

use adops_core::MetricRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsPeriod {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
    pub conversions: f64,
    pub revenue: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub roas: f64,
    pub conversion_rate: f64,
    pub cost_per_conversion: f64,
    pub revenue_per_click: f64,
    pub period: MetricsPeriod,
    pub data_points: usize,
}

/// One point of a daily trend line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsTrend {
    pub date: NaiveDate,
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
    pub conversions: f64,
    pub revenue: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub roas: f64,
    pub conversion_rate: f64,
    pub cost_per_conversion: f64,
    pub revenue_per_click: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricChange {
    pub value: f64,
    /// 0.0 when the previous value is 0, even if the metric went from 0 to N.
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsChanges {
    pub impressions: MetricChange,
    pub clicks: MetricChange,
    pub spend: MetricChange,
    pub conversions: MetricChange,
    pub revenue: MetricChange,
    pub ctr: MetricChange,
    pub cpc: MetricChange,
    pub cpm: MetricChange,
    pub roas: MetricChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsComparison {
    pub current: AggregatedMetrics,
    pub previous: AggregatedMetrics,
    pub changes: MetricsChanges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPerformer {
    pub id: String,
    pub metrics: AggregatedMetrics,
}

/// Identifying field rows are grouped by when ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    EntityId,
    CampaignId,
    AdsetId,
}

impl GroupBy {
    fn group_key<'a>(&self, row: &'a MetricRow) -> Option<&'a str> {
        match self {
            GroupBy::EntityId => Some(row.entity_id.as_str()),
            GroupBy::CampaignId => row.campaign_id.as_deref(),
            GroupBy::AdsetId => row.adset_id.as_deref(),
        }
    }
}

/// Numeric fields of [`AggregatedMetrics`] usable as a ranking criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    Impressions,
    Clicks,
    Spend,
    Conversions,
    #[default]
    Revenue,
    Ctr,
    Cpc,
    Cpm,
    Roas,
    ConversionRate,
    CostPerConversion,
    RevenuePerClick,
    DataPoints,
}

impl MetricField {
    pub fn value(&self, m: &AggregatedMetrics) -> f64 {
        match self {
            MetricField::Impressions => m.impressions as f64,
            MetricField::Clicks => m.clicks as f64,
            MetricField::Spend => m.spend,
            MetricField::Conversions => m.conversions,
            MetricField::Revenue => m.revenue,
            MetricField::Ctr => m.ctr,
            MetricField::Cpc => m.cpc,
            MetricField::Cpm => m.cpm,
            MetricField::Roas => m.roas,
            MetricField::ConversionRate => m.conversion_rate,
            MetricField::CostPerConversion => m.cost_per_conversion,
            MetricField::RevenuePerClick => m.revenue_per_click,
            MetricField::DataPoints => m.data_points as f64,
        }
    }
}

pub const DEFAULT_TOP_PERFORMERS_LIMIT: usize = 10;

/// Stateless transformations over daily metric rows.
pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn aggregate(rows: &[MetricRow]) -> AggregatedMetrics {
        Self::aggregate_refs(rows.iter())
    }

    fn aggregate_refs<'a>(rows: impl Iterator<Item = &'a MetricRow>) -> AggregatedMetrics {
        let mut m = AggregatedMetrics::default();
        let mut first: Option<NaiveDate> = None;
        let mut last: Option<NaiveDate> = None;

        for row in rows {
            m.impressions += row.impressions;
            m.clicks += row.clicks;
            m.spend += row.spend;
            m.conversions += row.conversions;
            m.revenue += row.revenue;
            m.data_points += 1;
            first = Some(first.map_or(row.date, |d| d.min(row.date)));
            last = Some(last.map_or(row.date, |d| d.max(row.date)));
        }

        let impressions = m.impressions as f64;
        let clicks = m.clicks as f64;
        m.ctr = ratio(clicks, impressions) * 100.0;
        m.cpc = ratio(m.spend, clicks);
        m.cpm = ratio(m.spend, impressions) * 1000.0;
        m.roas = ratio(m.revenue, m.spend);
        m.conversion_rate = ratio(m.conversions, clicks) * 100.0;
        m.cost_per_conversion = ratio(m.spend, m.conversions);
        m.revenue_per_click = ratio(m.revenue, clicks);

        if let (Some(start), Some(end)) = (first, last) {
            m.period = MetricsPeriod {
                start_date: start.format("%Y-%m-%d").to_string(),
                end_date: end.format("%Y-%m-%d").to_string(),
            };
        }
        m
    }

    /// One point per distinct date, ascending.
    pub fn generate_trend(rows: &[MetricRow]) -> Vec<MetricsTrend> {
        let mut by_date: BTreeMap<NaiveDate, Vec<&MetricRow>> = BTreeMap::new();
        for row in rows {
            by_date.entry(row.date).or_default().push(row);
        }

        by_date
            .into_iter()
            .map(|(date, day)| {
                let m = Self::aggregate_refs(day.into_iter());
                MetricsTrend {
                    date,
                    impressions: m.impressions,
                    clicks: m.clicks,
                    spend: m.spend,
                    conversions: m.conversions,
                    revenue: m.revenue,
                    ctr: m.ctr,
                    cpc: m.cpc,
                    cpm: m.cpm,
                    roas: m.roas,
                    conversion_rate: m.conversion_rate,
                    cost_per_conversion: m.cost_per_conversion,
                    revenue_per_click: m.revenue_per_click,
                }
            })
            .collect()
    }

    pub fn compare(current_rows: &[MetricRow], previous_rows: &[MetricRow]) -> MetricsComparison {
        let current = Self::aggregate(current_rows);
        let previous = Self::aggregate(previous_rows);

        let changes = MetricsChanges {
            impressions: change(current.impressions as f64, previous.impressions as f64),
            clicks: change(current.clicks as f64, previous.clicks as f64),
            spend: change(current.spend, previous.spend),
            conversions: change(current.conversions, previous.conversions),
            revenue: change(current.revenue, previous.revenue),
            ctr: change(current.ctr, previous.ctr),
            cpc: change(current.cpc, previous.cpc),
            cpm: change(current.cpm, previous.cpm),
            roas: change(current.roas, previous.roas),
        };

        MetricsComparison {
            current,
            previous,
            changes,
        }
    }

    /// Rank groups by `sort_by`, highest first. Groups are visited in id
    /// order and the sort is stable, so equal values keep a repeatable order.
    /// Rows without a value for the grouping field are left out.
    pub fn top_performers(
        rows: &[MetricRow],
        group_by: GroupBy,
        sort_by: MetricField,
        limit: usize,
    ) -> Vec<TopPerformer> {
        let mut groups: BTreeMap<&str, Vec<&MetricRow>> = BTreeMap::new();
        for row in rows {
            if let Some(id) = group_by.group_key(row) {
                groups.entry(id).or_default().push(row);
            }
        }

        let mut ranked: Vec<TopPerformer> = groups
            .into_iter()
            .map(|(id, group)| TopPerformer {
                id: id.to_string(),
                metrics: Self::aggregate_refs(group.into_iter()),
            })
            .collect();

        ranked.sort_by(|a, b| {
            sort_by
                .value(&b.metrics)
                .partial_cmp(&sort_by.value(&a.metrics))
                .unwrap_or(Ordering::Equal)
        });
        ranked.truncate(limit);
        ranked
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator != 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn change(current: f64, previous: f64) -> MetricChange {
    let value = current - previous;
    MetricChange {
        value,
        percentage: if previous != 0.0 {
            value / previous * 100.0
        } else {
            0.0
        },
    }
}
