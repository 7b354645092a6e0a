//! Rule-based performance insights over an aggregated summary.
//!
//! Every rule is checked independently; messages come out in table order.

use crate::aggregator::{AggregatedMetrics, MetricsAggregator};

struct InsightRule {
    applies: fn(&AggregatedMetrics) -> bool,
    message: &'static str,
}

const RULES: &[InsightRule] = &[
    InsightRule {
        applies: |m| m.ctr > 2.0,
        message: "Excellent click-through rate: creatives are resonating with the audience",
    },
    InsightRule {
        applies: |m| m.ctr < 0.5,
        message: "Low click-through rate: consider refreshing creatives or tightening targeting",
    },
    InsightRule {
        applies: |m| m.roas > 4.0,
        message: "Strong return on ad spend: consider scaling budget",
    },
    InsightRule {
        applies: |m| m.roas < 1.0,
        message: "Return on ad spend below break-even: review bidding and targeting",
    },
    InsightRule {
        applies: |m| m.cpc > 2.0,
        message: "High cost per click: review keyword bids and audience overlap",
    },
    InsightRule {
        applies: |m| m.conversion_rate > 5.0,
        message: "High conversion rate: landing experience is performing well",
    },
    InsightRule {
        applies: |m| m.conversion_rate < 1.0,
        message: "Low conversion rate: optimize landing pages and offer",
    },
    InsightRule {
        applies: |m| m.impressions < 1000,
        message: "Limited reach: increase budget or broaden targeting to gather more data",
    },
];

pub fn performance_insights(metrics: &AggregatedMetrics) -> Vec<String> {
    RULES
        .iter()
        .filter(|rule| (rule.applies)(metrics))
        .map(|rule| rule.message.to_string())
        .collect()
}

impl MetricsAggregator {
    pub fn performance_insights(metrics: &AggregatedMetrics) -> Vec<String> {
        performance_insights(metrics)
    }
}
