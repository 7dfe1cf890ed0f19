use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, post};
use serde::{Deserialize, Serialize};

use super::manager::{self, CreatedCampaign};
use super::{Campaign, CampaignFilter, CampaignId, CampaignRequest};
use crate::auth::db::assert_authenticated;
use crate::database::Database;
use crate::error::Error;
use crate::remote::RemoteApi;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeleteBody {
    pub success: bool,
}

#[post("/campaigns")]
#[tracing::instrument(skip(db, remote))]
pub async fn create_campaign(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    body: Json<CampaignRequest>,
) -> Result<Json<CreatedCampaign>, Error> {
    assert_authenticated(db.get_ref()).await?;

    let created =
        manager::create_campaign(db.get_ref(), remote.get_ref(), body.into_inner()).await?;

    Ok(Json(created))
}

#[get("/campaigns")]
#[tracing::instrument(skip(db))]
pub async fn get_campaigns(
    db: Data<dyn Database>,
    query: Query<CampaignFilter>,
) -> Result<Json<Vec<Campaign>>, Error> {
    assert_authenticated(db.get_ref()).await?;

    let campaigns = manager::get_campaigns(db.get_ref(), &query).await?;

    Ok(Json(campaigns))
}

#[get("/campaigns/{campaign_id}")]
#[tracing::instrument(skip(db, remote))]
pub async fn get_campaign_by_id(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    params: Path<CampaignId>,
) -> Result<Json<Campaign>, Error> {
    let campaign_id = params.into_inner();
    assert_authenticated(db.get_ref()).await?;

    let campaign =
        manager::get_campaign_by_id(db.get_ref(), remote.get_ref(), &campaign_id).await?;

    Ok(Json(campaign))
}

#[delete("/campaigns/{campaign_id}")]
#[tracing::instrument(skip(db))]
pub async fn delete_campaign(
    db: Data<dyn Database>,
    params: Path<CampaignId>,
) -> Result<Json<DeleteBody>, Error> {
    let campaign_id = params.into_inner();
    assert_authenticated(db.get_ref()).await?;

    manager::delete_campaign(db.get_ref(), &campaign_id).await?;

    Ok(Json(DeleteBody { success: true }))
}
