use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::campaign::{Campaign, CampaignStatus};

pub mod endpoints;
pub use endpoints::*;

const MAX_PERFORMANCE_POINTS: u32 = 6;

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub campaign_count: usize,
    pub status_counts: BTreeMap<CampaignStatus, usize>,
    pub total_budget: f64,
    pub total_impressions: u64,
    pub total_clicks: u64,
    pub total_conversions: u64,
    /// Mean ROI over campaigns that report one, to one decimal.
    pub average_roi: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PerformancePoint {
    pub date: NaiveDate,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
}

pub fn summarize(campaigns: &[Campaign]) -> DashboardSummary {
    let mut summary = DashboardSummary {
        campaign_count: campaigns.len(),
        ..Default::default()
    };

    let mut roi_total = 0.0;
    let mut roi_count = 0;
    for campaign in campaigns {
        *summary.status_counts.entry(campaign.status).or_default() += 1;
        summary.total_budget += campaign.budget;

        if let Some(metrics) = &campaign.metrics {
            summary.total_impressions += metrics.impressions;
            summary.total_clicks += metrics.clicks;
            summary.total_conversions += metrics.conversions;

            // a zero roi means none was reported
            if metrics.roi != 0.0 {
                roi_total += metrics.roi;
                roi_count += 1;
            }
        }
    }

    if roi_count > 0 {
        let average = roi_total / roi_count as f64;
        summary.average_roi = Some((average * 10.0).round() / 10.0);
    }

    summary
}

/// An illustrative daily series spread from the campaign's totals. Each day
/// shares one jitter factor across its metrics.
pub fn daily_performance<R: Rng>(campaign: &Campaign, rng: &mut R) -> Vec<PerformancePoint> {
    let metrics = match &campaign.metrics {
        Some(metrics) if campaign.days > 0 => metrics,
        _ => return vec![],
    };

    let days = campaign.days as f64;
    let start = campaign.created_at.date_naive();
    let spread = |total: u64, factor: f64| (total as f64 / days * factor).round() as u64;

    (0..campaign.days.min(MAX_PERFORMANCE_POINTS))
        .map(|day| {
            let factor = rng.gen_range(0.8..=1.2);
            PerformancePoint {
                date: start + Duration::days(day as i64),
                impressions: spread(metrics.impressions, factor),
                clicks: spread(metrics.clicks, factor),
                conversions: spread(metrics.conversions, factor),
            }
        })
        .collect()
}
