use actix_web::web::{Data, Json};
use actix_web::{get, patch, post};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::Error;
use crate::remote::{RemoteApi, Sourced};

use super::{manager, AuthResponse, AuthState, User, UserPatch};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
    pub full_name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ForgotPasswordBody {
    pub email: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordBody {
    pub token: String,
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordBody {
    pub current_password: String,
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MessageBody {
    pub success: bool,
    pub message: String,
}

impl MessageBody {
    fn new(message: &str) -> MessageBody {
        MessageBody {
            success: true,
            message: message.to_owned(),
        }
    }
}

#[post("/auth/login")]
#[tracing::instrument(skip(db, remote, auth, body))]
pub async fn login(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    auth: Data<AuthState>,
    body: Json<LoginBody>,
) -> Result<Json<Sourced<AuthResponse>>, Error> {
    let body = body.into_inner();

    let response = manager::login(
        db.get_ref(),
        remote.get_ref(),
        &auth,
        &body.email,
        &body.password,
    )
    .await?;

    Ok(Json(response))
}

#[post("/auth/register")]
#[tracing::instrument(skip(db, remote, auth, body))]
pub async fn register(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    auth: Data<AuthState>,
    body: Json<RegisterBody>,
) -> Result<Json<Sourced<AuthResponse>>, Error> {
    let body = body.into_inner();

    let response = manager::register(
        db.get_ref(),
        remote.get_ref(),
        &auth,
        &body.email,
        &body.password,
        body.confirm_password.as_deref(),
        &body.full_name,
    )
    .await?;

    Ok(Json(response))
}

#[post("/auth/logout")]
#[tracing::instrument(skip(db, auth))]
pub async fn logout(
    db: Data<dyn Database>,
    auth: Data<AuthState>,
) -> Result<Json<MessageBody>, Error> {
    manager::logout(db.get_ref(), &auth).await?;

    Ok(Json(MessageBody::new(
        "You have been successfully logged out.",
    )))
}

#[post("/auth/forgot-password")]
#[tracing::instrument(skip(remote))]
pub async fn forgot_password(
    remote: Data<dyn RemoteApi>,
    body: Json<ForgotPasswordBody>,
) -> Result<Json<MessageBody>, Error> {
    manager::forgot_password(remote.get_ref(), &body.email).await?;

    Ok(Json(MessageBody::new(
        "If the email exists in our system, you will receive password reset instructions.",
    )))
}

#[post("/auth/reset-password")]
#[tracing::instrument(skip(remote, auth, body))]
pub async fn reset_password(
    remote: Data<dyn RemoteApi>,
    auth: Data<AuthState>,
    body: Json<ResetPasswordBody>,
) -> Result<Json<Sourced<MessageBody>>, Error> {
    let body = body.into_inner();

    let result = manager::reset_password(
        remote.get_ref(),
        &auth,
        &body.token,
        &body.new_password,
        body.confirm_password.as_deref(),
    )
    .await?;

    Ok(Json(result.map(|_| {
        MessageBody::new(concat!(
            "Your password has been updated. ",
            "You can now log in with your new password."
        ))
    })))
}

#[get("/auth/me")]
#[tracing::instrument(skip(db, remote, auth))]
pub async fn get_current_user(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    auth: Data<AuthState>,
) -> Result<Json<Sourced<User>>, Error> {
    let user = manager::current_user(db.get_ref(), remote.get_ref(), &auth).await?;

    Ok(Json(user))
}

#[patch("/auth/me")]
#[tracing::instrument(skip(db, remote, auth))]
pub async fn update_current_user(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    auth: Data<AuthState>,
    body: Json<UserPatch>,
) -> Result<Json<Sourced<User>>, Error> {
    let user =
        manager::update_user(db.get_ref(), remote.get_ref(), &auth, body.into_inner()).await?;

    Ok(Json(user))
}

#[post("/users/password")]
#[tracing::instrument(skip(db, remote, body))]
pub async fn update_password(
    db: Data<dyn Database>,
    remote: Data<dyn RemoteApi>,
    body: Json<UpdatePasswordBody>,
) -> Result<Json<Sourced<MessageBody>>, Error> {
    let body = body.into_inner();

    let result = manager::update_password(
        db.get_ref(),
        remote.get_ref(),
        &body.current_password,
        &body.new_password,
        body.confirm_password.as_deref(),
    )
    .await?;

    Ok(Json(
        result.map(|_| MessageBody::new("Your password has been updated.")),
    ))
}
