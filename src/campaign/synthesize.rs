//! Builds the locally stored campaign record out of a backend response.
//!
//! The backend only returns free-text agent transcripts, so the creative
//! details are scraped out of the text with loose patterns and fall back to
//! fixed copy when nothing matches.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value};

use crate::remote::{ApiResponse, QueryResponse};

use super::{
    AdCreative, AudienceTargeting, Campaign, CampaignDraft, CampaignMetrics, CampaignStatus,
    Demographics, Distribution,
};

const AD_SETUP_STATES: &[&str] = &["set_image_and_group", "End"];

const FALLBACK_HEADLINES: &[&str] = &[
    "Summer Sale: Up to 50% Off Everything",
    "Exclusive Summer Deals You Can't Miss",
    "Limited Time: Summer Savings Event",
];

const FALLBACK_DESCRIPTIONS: &[&str] = &[
    "Refresh your summer wardrobe with our exclusive collection",
    "Shop now for the best deals",
    "Quality products at unbeatable prices",
];

const DEFAULT_BID_STRATEGY: &str = "TARGET_CPA";
const AD_ROTATION: &str = "OPTIMIZE";
const DEFAULT_LANGUAGE: &str = "en";
const CONTENT_EXCLUSIONS: &[&str] = &["PARKED_DOMAIN"];

static HEADLINES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)headlines?:?\s*(.*?)(?:description|$)").expect("headline regex is valid")
});
static DESCRIPTIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)descriptions?:?\s*(.*?)$").expect("description regex is valid")
});
static BUSINESS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)business name:?\s*(.*?)(?:\.|$)").expect("business name regex is valid")
});
static TRACKING_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)tracking template:?\s*(.*?)(?:\.|$)")
        .expect("tracking template regex is valid")
});

pub fn synthesize_campaign<R: Rng>(
    draft: &CampaignDraft,
    response: &ApiResponse,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Campaign {
    let criteria = response
        .responses
        .iter()
        .find_map(|entry| entry.audience_criteria.as_ref());
    let ad_setup = response
        .responses
        .iter()
        .find(|entry| AD_SETUP_STATES.contains(&entry.state.as_str()));

    let (ad_creatives, tracking_template) = match ad_setup {
        Some(entry) => {
            let (creative, tracking_template) = scrape_creative(entry, &draft.url);
            (Some(vec![creative]), tracking_template)
        }
        None => (None, None),
    };

    Campaign {
        id: draft.id.clone(),
        name: format!("Campaign for {}", draft.url),
        budget: draft.budget,
        days: draft.days,
        url: draft.url.clone(),
        status: CampaignStatus::Running,
        created_at: now,
        last_updated: now,
        metrics: Some(estimate_metrics(draft.budget, draft.days, rng)),
        ad_creatives,
        audience_targeting: Some(audience_targeting(criteria)),
        bid_strategy: Some(
            criteria
                .and_then(|criteria| criteria.get("bid_strategy"))
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_BID_STRATEGY)
                .to_owned(),
        ),
        ad_rotation_settings: Some(AD_ROTATION.to_owned()),
        language_targeting: Some(languages(criteria)),
        content_exclusions: Some(to_strings(CONTENT_EXCLUSIONS)),
        schedules: None,
        tracking_template,
    }
}

/// Budget-proportional estimates; only the ROI is random.
pub fn estimate_metrics<R: Rng>(budget: f64, days: u32, rng: &mut R) -> CampaignMetrics {
    let days = f64::from(days.max(1));
    let daily_budget = budget / days;

    let impressions = (daily_budget * 100.0 * days).round() as u64;
    let clicks = (daily_budget * 3.5 * days).round() as u64;
    let conversions = (daily_budget * 0.25 * days).round() as u64;
    let cost_per_click = if clicks == 0 {
        0.0
    } else {
        round_to(budget / clicks as f64, 2)
    };

    CampaignMetrics {
        impressions,
        clicks,
        conversions,
        cost_per_click,
        roi: round_to(rng.gen_range(1.5..=3.5), 1),
    }
}

fn scrape_creative(entry: &QueryResponse, url: &str) -> (AdCreative, Option<String>) {
    let text = entry.response.as_str();

    let headlines = capture(&HEADLINES, text)
        .map(|found| split_list(found, &[',', ';']))
        .filter(|headlines| !headlines.is_empty())
        .unwrap_or_else(|| to_strings(FALLBACK_HEADLINES));
    let descriptions = capture(&DESCRIPTIONS, text)
        .map(|found| split_list(found, &['.', ';']))
        .filter(|descriptions| !descriptions.is_empty())
        .unwrap_or_else(|| to_strings(FALLBACK_DESCRIPTIONS));
    let business_name = capture(&BUSINESS_NAME, text)
        .map(|found| found.trim().to_owned())
        .unwrap_or_else(|| host_name(url));
    let tracking_template =
        capture(&TRACKING_TEMPLATE, text).map(|found| found.trim().to_owned());

    let creative = AdCreative {
        headlines,
        descriptions,
        business_name,
        display_url: url.to_owned(),
        final_url: url.to_owned(),
        image_urls: None,
    };

    (creative, tracking_template)
}

fn audience_targeting(criteria: Option<&Map<String, Value>>) -> AudienceTargeting {
    let age_range = match criteria.and_then(|criteria| criteria.get("age_range_exclusions")) {
        Some(Value::Array(ranges)) => ranges
            .iter()
            .filter_map(Value::as_str)
            .map(|range| (range.to_owned(), 20))
            .collect(),
        _ => distribution(&[
            ("25-34", 40),
            ("35-44", 25),
            ("18-24", 15),
            ("45-54", 12),
            ("55+", 8),
        ]),
    };

    let interests = criteria
        .and_then(|criteria| {
            ["segments", "topics"]
                .iter()
                .find_map(|key| criteria.get(*key).and_then(Value::as_array))
        })
        .map(|values| values.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();

    AudienceTargeting {
        demographics: Demographics {
            gender: distribution(&[("Male", 65), ("Female", 35)]),
            age_range,
        },
        interests,
        devices: distribution(&[("Mobile", 68), ("Desktop", 27), ("Tablet", 5)]),
        locations: distribution(&[
            ("United States", 45),
            ("United Kingdom", 15),
            ("Canada", 12),
            ("Australia", 8),
            ("Germany", 7),
            ("Other", 13),
        ]),
    }
}

fn languages(criteria: Option<&Map<String, Value>>) -> Vec<String> {
    match criteria.and_then(|criteria| criteria.get("language")) {
        Some(Value::String(language)) => vec![language.clone()],
        Some(Value::Array(languages)) => languages
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => vec![DEFAULT_LANGUAGE.to_owned()],
    }
}

fn capture<'t>(regex: &Regex, text: &'t str) -> Option<&'t str> {
    let captures = regex.captures(text)?;
    captures.get(1).map(|found| found.as_str())
}

fn split_list(text: &str, separators: &[char]) -> Vec<String> {
    text.split(|c| separators.contains(&c))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// `https://www.shop.example/path` -> `shop.example`
fn host_name(url: &str) -> String {
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let url = url.strip_prefix("www.").unwrap_or(url);

    url.split('/').next().unwrap_or_default().to_owned()
}

fn distribution(entries: &[(&str, u32)]) -> Distribution {
    entries
        .iter()
        .map(|(name, share)| (name.to_string(), *share))
        .collect()
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
