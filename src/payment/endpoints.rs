use actix_web::web::{Data, Json, Path};
use actix_web::{delete, get, post};
use serde::{Deserialize, Serialize};

use super::{manager, PaymentMethod};
use crate::campaign::CampaignId;
use crate::database::Database;
use crate::error::Error;
use crate::remote::{RemoteApi, Sourced};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPaymentMethodBody {
    pub payment_method_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentBody {
    pub campaign_id: CampaignId,
    pub amount: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SuccessBody {
    pub success: bool,
}

fn success(result: Sourced<()>) -> Json<Sourced<SuccessBody>> {
    Json(result.map(|_| SuccessBody { success: true }))
}

#[get("/payments/methods")]
#[tracing::instrument(skip(db, remote))]
pub async fn get_payment_methods(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
) -> Result<Json<Sourced<Vec<PaymentMethod>>>, Error> {
    let methods = manager::list_payment_methods(db.get_ref(), remote.get_ref()).await?;

    Ok(Json(methods))
}

#[post("/payments/methods")]
#[tracing::instrument(skip(db, remote))]
pub async fn add_payment_method(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    body: Json<AddPaymentMethodBody>,
) -> Result<Json<Sourced<SuccessBody>>, Error> {
    let result =
        manager::add_payment_method(db.get_ref(), remote.get_ref(), &body.payment_method_id)
            .await?;

    Ok(success(result))
}

#[delete("/payments/methods/{payment_method_id}")]
#[tracing::instrument(skip(db, remote))]
pub async fn remove_payment_method(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    params: Path<String>,
) -> Result<Json<Sourced<SuccessBody>>, Error> {
    let payment_method_id = params.into_inner();

    let result =
        manager::remove_payment_method(db.get_ref(), remote.get_ref(), &payment_method_id).await?;

    Ok(success(result))
}

#[post("/payments/process")]
#[tracing::instrument(skip(db, remote))]
pub async fn process_payment(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    body: Json<ProcessPaymentBody>,
) -> Result<Json<Sourced<SuccessBody>>, Error> {
    let body = body.into_inner();

    let result =
        manager::process_payment(db.get_ref(), remote.get_ref(), &body.campaign_id, body.amount)
            .await?;

    Ok(success(result))
}
