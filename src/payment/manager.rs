use tracing::info;

use crate::auth::db::assert_authenticated;
use crate::campaign::CampaignId;
use crate::database::Database;
use crate::error::Error;
use crate::remote::{or_mock, RemoteApi, Sourced};

use super::PaymentMethod;

#[tracing::instrument(skip(db, remote))]
pub async fn list_payment_methods(
    db: &dyn Database,
    remote: &dyn RemoteApi,
) -> Result<Sourced<Vec<PaymentMethod>>, Error> {
    let token = assert_authenticated(db).await?;

    let result = remote.fetch_payment_methods(&token).await;

    or_mock(result, "listing payment methods", || {
        Ok(vec![PaymentMethod::mock()])
    })
}

#[tracing::instrument(skip(db, remote))]
pub async fn add_payment_method(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    payment_method_id: &str,
) -> Result<Sourced<()>, Error> {
    let token = assert_authenticated(db).await?;
    crate::auth::require_field(payment_method_id, "paymentMethodId")?;

    let result = remote.add_payment_method(&token, payment_method_id).await;

    let added = or_mock(result, "adding payment method", || Ok(()))?;
    info!(%payment_method_id, mock = added.is_mock(), "payment method added");

    Ok(added)
}

#[tracing::instrument(skip(db, remote))]
pub async fn remove_payment_method(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    payment_method_id: &str,
) -> Result<Sourced<()>, Error> {
    let token = assert_authenticated(db).await?;

    let result = remote.remove_payment_method(&token, payment_method_id).await;

    let removed = or_mock(result, "removing payment method", || Ok(()))?;
    info!(%payment_method_id, mock = removed.is_mock(), "payment method removed");

    Ok(removed)
}

#[tracing::instrument(skip(db, remote))]
pub async fn process_payment(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    campaign_id: &CampaignId,
    amount: f64,
) -> Result<Sourced<()>, Error> {
    let token = assert_authenticated(db).await?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }

    let result = remote.process_payment(&token, campaign_id, amount).await;

    let processed = or_mock(result, "processing payment", || Ok(()))?;
    info!(%campaign_id, amount, mock = processed.is_mock(), "payment processed");

    Ok(processed)
}
