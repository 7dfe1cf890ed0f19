use crate::database::Database;
use crate::error::Error;

use super::{Campaign, CampaignId};

const CAMPAIGNS: &str = "campaigns";

#[tracing::instrument(skip(db))]
pub async fn fetch_campaigns(db: &dyn Database) -> Result<Vec<Campaign>, Error> {
    let campaigns = match db.get_item(CAMPAIGNS).await? {
        Some(value) => serde_json::from_str(&value)?,
        None => vec![],
    };

    Ok(campaigns)
}

#[tracing::instrument(skip(db, campaigns))]
async fn store_campaigns(db: &dyn Database, campaigns: &[Campaign]) -> Result<(), Error> {
    let value = serde_json::to_string(campaigns)?;
    db.set_item(CAMPAIGNS, value).await?;

    Ok(())
}

/// Inserts the campaign, replacing any stored campaign with the same id in
/// place. Returns whether an existing entry was replaced.
#[tracing::instrument(skip(db, campaign), fields(campaign_id = %campaign.id))]
pub async fn upsert_campaign(db: &dyn Database, campaign: &Campaign) -> Result<bool, Error> {
    let _guard = db.write_lock().lock().await;
    let mut campaigns = fetch_campaigns(db).await?;

    let replaced = match campaigns.iter_mut().find(|c| c.id == campaign.id) {
        Some(existing) => {
            *existing = campaign.clone();
            true
        }
        None => {
            campaigns.push(campaign.clone());
            false
        }
    };

    store_campaigns(db, &campaigns).await?;

    Ok(replaced)
}

#[tracing::instrument(skip(db))]
pub async fn fetch_campaign_by_id(
    db: &dyn Database,
    campaign_id: &CampaignId,
) -> Result<Option<Campaign>, Error> {
    let campaign = fetch_campaigns(db)
        .await?
        .into_iter()
        .find(|campaign| &campaign.id == campaign_id);

    Ok(campaign)
}

#[tracing::instrument(skip(db))]
pub async fn assert_campaign_exists(
    db: &dyn Database,
    campaign_id: &CampaignId,
) -> Result<Campaign, Error> {
    fetch_campaign_by_id(db, campaign_id)
        .await?
        .ok_or_else(|| Error::CampaignNotFound {
            campaign_id: campaign_id.clone(),
        })
}

/// Returns whether anything was removed.
#[tracing::instrument(skip(db))]
pub async fn delete_campaign(db: &dyn Database, campaign_id: &CampaignId) -> Result<bool, Error> {
    let _guard = db.write_lock().lock().await;
    let mut campaigns = fetch_campaigns(db).await?;
    let before = campaigns.len();
    campaigns.retain(|campaign| &campaign.id != campaign_id);

    store_campaigns(db, &campaigns).await?;

    Ok(campaigns.len() != before)
}
