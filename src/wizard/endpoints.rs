use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, put};
use serde::{Deserialize, Serialize};

use super::{manager, Wizard, WizardDetails, WizardId, WizardRegistry};
use crate::auth::db::assert_authenticated;
use crate::campaign::manager::CreatedCampaign;
use crate::database::Database;
use crate::error::Error;
use crate::remote::RemoteApi;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UrlBody {
    pub url: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubmittedBody {
    pub wizard: Wizard,
    #[serde(flatten)]
    pub created: CreatedCampaign,
}

#[post("/wizards")]
#[tracing::instrument(skip(db, registry))]
pub async fn start_wizard(
    db: Data<dyn Database>,
    registry: Data<WizardRegistry>,
) -> Result<Json<Wizard>, Error> {
    assert_authenticated(db.get_ref()).await?;

    Ok(Json(manager::start_wizard(&registry)))
}

#[get("/wizards/{wizard_id}")]
#[tracing::instrument(skip(db, registry))]
pub async fn get_wizard(
    db: Data<dyn Database>,
    registry: Data<WizardRegistry>,
    params: Path<WizardId>,
) -> Result<Json<Wizard>, Error> {
    let wizard_id = params.into_inner();
    assert_authenticated(db.get_ref()).await?;

    Ok(Json(manager::get_wizard(&registry, wizard_id)?))
}

#[put("/wizards/{wizard_id}/url")]
#[tracing::instrument(skip(db, registry))]
pub async fn set_wizard_url(
    db: Data<dyn Database>,
    registry: Data<WizardRegistry>,
    params: Path<WizardId>,
    body: Json<UrlBody>,
) -> Result<Json<Wizard>, Error> {
    let wizard_id = params.into_inner();
    assert_authenticated(db.get_ref()).await?;

    Ok(Json(manager::set_url(&registry, wizard_id, &body.url)?))
}

#[put("/wizards/{wizard_id}/details")]
#[tracing::instrument(skip(db, registry))]
pub async fn set_wizard_details(
    db: Data<dyn Database>,
    registry: Data<WizardRegistry>,
    params: Path<WizardId>,
    body: Json<WizardDetails>,
) -> Result<Json<Wizard>, Error> {
    let wizard_id = params.into_inner();
    assert_authenticated(db.get_ref()).await?;

    Ok(Json(manager::set_details(&registry, wizard_id, &body)?))
}

#[post("/wizards/{wizard_id}/back")]
#[tracing::instrument(skip(db, registry))]
pub async fn wizard_back(
    db: Data<dyn Database>,
    registry: Data<WizardRegistry>,
    params: Path<WizardId>,
) -> Result<Json<Wizard>, Error> {
    let wizard_id = params.into_inner();
    assert_authenticated(db.get_ref()).await?;

    Ok(Json(manager::go_back(&registry, wizard_id)?))
}

#[post("/wizards/{wizard_id}/submit")]
#[tracing::instrument(skip(db, remote, registry))]
pub async fn submit_wizard(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    registry: Data<WizardRegistry>,
    params: Path<WizardId>,
) -> Result<Json<SubmittedBody>, Error> {
    let wizard_id = params.into_inner();
    assert_authenticated(db.get_ref()).await?;

    let (wizard, created) =
        manager::submit(&registry, db.get_ref(), remote.get_ref(), wizard_id).await?;

    Ok(Json(SubmittedBody { wizard, created }))
}
