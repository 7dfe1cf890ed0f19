use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub mod db;
pub mod endpoints;
pub mod manager;
pub mod synthesize;
pub use endpoints::*;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CampaignId(String);

impl CampaignId {
    /// A short random base-36 id, the same shape the dashboard has always
    /// handed out.
    pub fn generate() -> CampaignId {
        let mut rng = rand::thread_rng();
        let id = (0..ID_LENGTH)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();

        CampaignId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CampaignId {
    fn from(id: &str) -> CampaignId {
        CampaignId(id.to_owned())
    }
}

impl From<String> for CampaignId {
    fn from(id: String) -> CampaignId {
        CampaignId(id)
    }
}

impl Display for CampaignId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub budget: f64,
    pub days: u32,
    pub url: String,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<CampaignMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_creatives: Option<Vec<AdCreative>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience_targeting: Option<AudienceTargeting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_rotation_settings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_targeting: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_exclusions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedules: Option<Vec<Schedule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_template: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetrics {
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub cost_per_click: f64,
    pub roi: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCreative {
    pub headlines: Vec<String>,
    pub descriptions: Vec<String>,
    pub business_name: String,
    pub display_url: String,
    pub final_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
}

/// Percentages keyed by segment name.
pub type Distribution = BTreeMap<String, u32>;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceTargeting {
    pub demographics: Demographics,
    pub interests: Vec<String>,
    pub devices: Distribution,
    pub locations: Distribution,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub gender: Distribution,
    pub age_range: Distribution,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub day_of_week: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

/// What the ad-generation backend expects; every field travels as a string.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    pub budget: String,
    pub days: String,
    #[serde(default)]
    pub campaign_id: String,
    pub url: String,
}

/// A request whose fields have been checked and parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct CampaignDraft {
    pub id: CampaignId,
    pub budget: f64,
    pub days: u32,
    pub url: String,
}

impl CampaignRequest {
    pub fn validate(&self) -> Result<CampaignDraft, Error> {
        validate_url(&self.url)?;
        let budget = parse_budget(&self.budget)?;
        let days = parse_days(&self.days)?;
        let id = match self.campaign_id.trim() {
            "" => CampaignId::generate(),
            id => CampaignId::from(id),
        };

        Ok(CampaignDraft {
            id,
            budget,
            days,
            url: self.url.trim().to_owned(),
        })
    }
}

impl CampaignDraft {
    /// The request as the backend receives it, always carrying the id the
    /// campaign will be stored under.
    pub fn to_request(&self) -> CampaignRequest {
        CampaignRequest {
            budget: self.budget.to_string(),
            days: self.days.to_string(),
            campaign_id: self.id.to_string(),
            url: self.url.clone(),
        }
    }
}

/// Narrows a campaign listing. An empty filter keeps everything.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CampaignFilter {
    /// Case-insensitive match against the name or the URL.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<CampaignStatus>,
}

impl CampaignFilter {
    pub fn matches(&self, campaign: &Campaign) -> bool {
        if let Some(search) = self.search.as_deref().filter(|search| !search.is_empty()) {
            let search = search.to_lowercase();
            if !campaign.name.to_lowercase().contains(&search)
                && !campaign.url.to_lowercase().contains(&search)
            {
                return false;
            }
        }

        match self.status {
            Some(status) => campaign.status == status,
            None => true,
        }
    }
}

/// Accepts absolute http(s) URLs with a host.
pub fn validate_url(url: &str) -> Result<Url, Error> {
    let invalid = || Error::InvalidUrl {
        url: url.to_owned(),
    };

    let parsed = Url::parse(url.trim()).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }

    Ok(parsed)
}

pub fn parse_budget(budget: &str) -> Result<f64, Error> {
    let invalid = || Error::InvalidBudget {
        budget: budget.to_owned(),
    };

    if budget.trim().is_empty() {
        return Err(Error::MissingRequiredField { field: "budget" });
    }

    let value: f64 = budget.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid());
    }

    Ok(value)
}

pub fn parse_days(days: &str) -> Result<u32, Error> {
    let invalid = || Error::InvalidDays {
        days: days.to_owned(),
    };

    if days.trim().is_empty() {
        return Err(Error::MissingRequiredField { field: "days" });
    }

    let value: u32 = days.trim().parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(invalid());
    }

    Ok(value)
}
