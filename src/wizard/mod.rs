use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use serde::{Deserialize, Serialize};

use crate::campaign::{self, Campaign, CampaignDraft, CampaignId};
use crate::error::Error;
use crate::typedid::{TypedId, TypedIdMarker};

pub mod endpoints;
pub mod manager;
pub use endpoints::*;

pub const MINIMUM_BUDGET: f64 = 10.0;
pub const MAXIMUM_DAYS: u32 = 90;

/// Wizards untouched for this long are dropped from the registry.
pub const WIZARD_IDLE_MINUTES: i64 = 60;

pub type WizardId = TypedId<Wizard>;

impl TypedIdMarker for Wizard {
    fn tag() -> &'static str {
        "WIZ"
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WizardStep {
    CollectUrl,
    CollectDetails,
    Review,
    Done,
}

/// What the details step collects; numbers arrive as entered.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardDetails {
    pub budget: String,
    pub days: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wizard {
    pub id: WizardId,
    pub step: WizardStep,
    pub url: Option<String>,
    pub budget: Option<f64>,
    pub days: Option<u32>,
    pub campaign_id: Option<CampaignId>,
    pub submitting: bool,
    pub campaign: Option<Campaign>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Wizard {
    pub fn new(now: DateTime<Utc>) -> Wizard {
        Wizard {
            id: WizardId::new(),
            step: WizardStep::CollectUrl,
            url: None,
            budget: None,
            days: None,
            campaign_id: None,
            submitting: false,
            campaign: None,
            created_at: now,
            modified_at: now,
        }
    }

    fn assert_step(&self, expected_step: WizardStep) -> Result<(), Error> {
        if self.step != expected_step {
            return Err(Error::WizardStepMismatch {
                wizard_id: self.id,
                expected_step,
                current_step: self.step,
            });
        }

        Ok(())
    }

    fn assert_not_submitting(&self) -> Result<(), Error> {
        if self.submitting {
            return Err(Error::WizardSubmissionInProgress { wizard_id: self.id });
        }

        Ok(())
    }

    pub fn set_url(&mut self, url: &str, now: DateTime<Utc>) -> Result<(), Error> {
        self.assert_step(WizardStep::CollectUrl)?;
        campaign::validate_url(url)?;

        self.url = Some(url.trim().to_owned());
        self.step = WizardStep::CollectDetails;
        self.modified_at = now;

        Ok(())
    }

    pub fn set_details(
        &mut self,
        details: &WizardDetails,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.assert_step(WizardStep::CollectDetails)?;

        let budget = campaign::parse_budget(&details.budget)?;
        if budget < MINIMUM_BUDGET {
            return Err(Error::InvalidBudget {
                budget: details.budget.clone(),
            });
        }

        let days = campaign::parse_days(&details.days)?;
        if days > MAXIMUM_DAYS {
            return Err(Error::InvalidDays {
                days: details.days.clone(),
            });
        }

        let campaign_id = match details.campaign_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => CampaignId::from(id),
            _ => CampaignId::generate(),
        };

        self.budget = Some(budget);
        self.days = Some(days);
        self.campaign_id = Some(campaign_id);
        self.step = WizardStep::Review;
        self.modified_at = now;

        Ok(())
    }

    /// Entered values are kept so going forward again starts from them.
    pub fn back(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        self.assert_not_submitting()?;

        self.step = match self.step {
            WizardStep::CollectDetails => WizardStep::CollectUrl,
            WizardStep::Review => WizardStep::CollectDetails,
            current_step => {
                return Err(Error::WizardCannotGoBack {
                    wizard_id: self.id,
                    current_step,
                })
            }
        };
        self.modified_at = now;

        Ok(())
    }

    /// Marks the wizard as submitting and hands out the draft to send.
    pub fn begin_submit(&mut self) -> Result<CampaignDraft, Error> {
        self.assert_step(WizardStep::Review)?;
        self.assert_not_submitting()?;

        let draft = CampaignDraft {
            id: self
                .campaign_id
                .clone()
                .ok_or(Error::MissingRequiredField { field: "campaignId" })?,
            budget: self
                .budget
                .ok_or(Error::MissingRequiredField { field: "budget" })?,
            days: self.days.ok_or(Error::MissingRequiredField { field: "days" })?,
            url: self
                .url
                .clone()
                .ok_or(Error::MissingRequiredField { field: "url" })?,
        };

        self.submitting = true;

        Ok(draft)
    }

    /// Without a campaign the submission failed and the wizard stays in
    /// review so it can be retried.
    pub fn finish_submit(&mut self, campaign: Option<Campaign>, now: DateTime<Utc>) {
        self.submitting = false;
        self.modified_at = now;

        if let Some(campaign) = campaign {
            self.campaign = Some(campaign);
            self.step = WizardStep::Done;
        }
    }
}

/// In-memory wizards keyed by id. The lock is only held for synchronous
/// state changes, never across a backend call.
#[derive(Debug, Default)]
pub struct WizardRegistry {
    wizards: Mutex<HashMap<WizardId, Wizard>>,
}

impl WizardRegistry {
    pub fn new() -> WizardRegistry {
        WizardRegistry::default()
    }

    /// Also evicts idle wizards, measured from the new wizard's creation
    /// time. Wizards that are mid-submission are kept.
    pub fn insert(&self, wizard: Wizard) {
        let cutoff = wizard.created_at - Duration::minutes(WIZARD_IDLE_MINUTES);
        let mut wizards = self.wizards.lock().unwrap();

        let before = wizards.len();
        wizards.retain(|_, existing| existing.submitting || existing.modified_at > cutoff);
        if wizards.len() != before {
            debug!(evicted = before - wizards.len(), "evicted idle wizards");
        }

        wizards.insert(wizard.id, wizard);
    }

    pub fn get(&self, wizard_id: WizardId) -> Result<Wizard, Error> {
        self.wizards
            .lock()
            .unwrap()
            .get(&wizard_id)
            .cloned()
            .ok_or(Error::WizardNotFound { wizard_id })
    }

    /// Runs `f` against the stored wizard. The wizard is only modified if
    /// `f` succeeds.
    pub fn update<T, F>(&self, wizard_id: WizardId, f: F) -> Result<(T, Wizard), Error>
    where
        F: FnOnce(&mut Wizard) -> Result<T, Error>,
    {
        let mut wizards = self.wizards.lock().unwrap();
        let wizard = wizards
            .get_mut(&wizard_id)
            .ok_or(Error::WizardNotFound { wizard_id })?;

        let mut updated = wizard.clone();
        let value = f(&mut updated)?;
        *wizard = updated.clone();

        Ok((value, updated))
    }
}
