use chrono::Utc;
use tracing::{info, warn};

use crate::campaign::manager::{create_campaign_from_draft, CreatedCampaign};
use crate::campaign::Campaign;
use crate::database::Database;
use crate::error::Error;
use crate::remote::RemoteApi;

use super::{Wizard, WizardDetails, WizardId, WizardRegistry};

#[tracing::instrument(skip(registry))]
pub fn start_wizard(registry: &WizardRegistry) -> Wizard {
    let wizard = Wizard::new(Utc::now());
    registry.insert(wizard.clone());
    info!(wizard_id = %wizard.id, "wizard started");

    wizard
}

#[tracing::instrument(skip(registry))]
pub fn get_wizard(registry: &WizardRegistry, wizard_id: WizardId) -> Result<Wizard, Error> {
    registry.get(wizard_id)
}

#[tracing::instrument(skip(registry))]
pub fn set_url(registry: &WizardRegistry, wizard_id: WizardId, url: &str) -> Result<Wizard, Error> {
    let (_, wizard) = registry.update(wizard_id, |wizard| wizard.set_url(url, Utc::now()))?;

    Ok(wizard)
}

#[tracing::instrument(skip(registry))]
pub fn set_details(
    registry: &WizardRegistry,
    wizard_id: WizardId,
    details: &WizardDetails,
) -> Result<Wizard, Error> {
    let (_, wizard) =
        registry.update(wizard_id, |wizard| wizard.set_details(details, Utc::now()))?;

    Ok(wizard)
}

#[tracing::instrument(skip(registry))]
pub fn go_back(registry: &WizardRegistry, wizard_id: WizardId) -> Result<Wizard, Error> {
    let (_, wizard) = registry.update(wizard_id, |wizard| wizard.back(Utc::now()))?;

    Ok(wizard)
}

/// A submission in flight. If it is dropped before `finish` runs, as happens
/// when the client disconnects mid-request, the wizard goes back to review.
struct PendingSubmit<'a> {
    registry: &'a WizardRegistry,
    wizard_id: WizardId,
    finished: bool,
}

impl PendingSubmit<'_> {
    fn finish(mut self, campaign: Option<Campaign>) -> Result<Wizard, Error> {
        self.finished = true;
        let (_, wizard) = self.registry.update(self.wizard_id, |wizard| {
            wizard.finish_submit(campaign, Utc::now());
            Ok(())
        })?;

        Ok(wizard)
    }
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        warn!(wizard_id = %self.wizard_id, "wizard submission abandoned");
        let _ = self.registry.update(self.wizard_id, |wizard| {
            wizard.finish_submit(None, Utc::now());
            Ok(())
        });
    }
}

/// Sends the reviewed draft through the campaign client. The wizard is
/// flagged as submitting for the duration of the backend call so a second
/// submit is turned away instead of creating the campaign twice.
#[tracing::instrument(skip(registry, db, remote))]
pub async fn submit(
    registry: &WizardRegistry,
    db: &dyn Database,
    remote: &dyn RemoteApi,
    wizard_id: WizardId,
) -> Result<(Wizard, CreatedCampaign), Error> {
    let (draft, _) = registry.update(wizard_id, |wizard| wizard.begin_submit())?;
    let pending = PendingSubmit {
        registry,
        wizard_id,
        finished: false,
    };

    let result = create_campaign_from_draft(db, remote, &draft).await;
    if let Err(err) = &result {
        warn!(%wizard_id, error = %err, "wizard submission failed");
    }

    let campaign = result.as_ref().ok().map(|created| created.campaign.clone());
    let wizard = pending.finish(campaign)?;

    let created = result?;
    info!(%wizard_id, campaign_id = %created.campaign.id, "wizard submitted");

    Ok((wizard, created))
}
