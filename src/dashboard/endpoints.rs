use actix_web::get;
use actix_web::web::{Data, Json, Path};

use super::{daily_performance, summarize, DashboardSummary, PerformancePoint};
use crate::auth::db::assert_authenticated;
use crate::campaign::{db, CampaignId};
use crate::database::Database;
use crate::error::Error;

#[get("/dashboard/summary")]
#[tracing::instrument(skip(db))]
pub async fn get_summary(db: Data<dyn Database>) -> Result<Json<DashboardSummary>, Error> {
    assert_authenticated(db.get_ref()).await?;

    let campaigns = db::fetch_campaigns(db.get_ref()).await?;

    Ok(Json(summarize(&campaigns)))
}

#[get("/campaigns/{campaign_id}/performance")]
#[tracing::instrument(skip(db))]
pub async fn get_campaign_performance(
    db: Data<dyn Database>,
    params: Path<CampaignId>,
) -> Result<Json<Vec<PerformancePoint>>, Error> {
    let campaign_id = params.into_inner();
    assert_authenticated(db.get_ref()).await?;

    let campaign = db::assert_campaign_exists(db.get_ref(), &campaign_id).await?;
    let points = daily_performance(&campaign, &mut rand::thread_rng());

    Ok(Json(points))
}
