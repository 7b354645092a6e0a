use crate::error::{MetricsError, MetricsResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three scopes ad-platform metrics can be attached to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Campaign,
    #[serde(rename = "adset")]
    AdSet,
    Ad,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Campaign => "campaign",
            EntityType::AdSet => "adset",
            EntityType::Ad => "ad",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "campaign" => Ok(EntityType::Campaign),
            "adset" | "ad_set" => Ok(EntityType::AdSet),
            "ad" => Ok(EntityType::Ad),
            other => Err(MetricsError::InvalidKey(format!(
                "unknown entity type '{other}'"
            ))),
        }
    }
}

/// Inclusive calendar date range. `start_date <= end_date` always holds.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub struct DateRange {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> MetricsResult<Self> {
        if start_date > end_date {
            return Err(MetricsError::InvalidDateRange(format!(
                "start {start_date} is after end {end_date}"
            )));
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    /// Parse two ISO `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> MetricsResult<Self> {
        Self::new(parse_iso_date(start)?, parse_iso_date(end)?)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

pub fn parse_iso_date(s: &str) -> MetricsResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| MetricsError::InvalidDateRange(format!("'{s}': {e}")))
}

/// One day of delivery metrics for a single entity, as produced by the
/// ad-platform sync jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub entity_id: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub adset_id: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub conversions: f64,
    #[serde(default)]
    pub revenue: f64,
}
