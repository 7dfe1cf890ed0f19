use tracing::{debug, info, warn};

use crate::database::Database;
use crate::error::Error;
use crate::remote::{or_mock, RemoteApi, Sourced};

use super::{db, require_field, validate_new_password, AuthResponse, AuthState, User, UserPatch};

fn is_rejection(error: &Error, statuses: &[u16]) -> bool {
    matches!(error.remote_status(), Some(status) if statuses.contains(&status))
}

#[tracing::instrument(skip(db, remote, auth, password))]
pub async fn login(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    auth: &AuthState,
    email: &str,
    password: &str,
) -> Result<Sourced<AuthResponse>, Error> {
    require_field(email, "email")?;
    require_field(password, "password")?;

    let result = remote.login(email, password).await.map_err(|err| {
        if is_rejection(&err, &[400, 401, 403, 404]) {
            Error::InvalidCredentials
        } else {
            err
        }
    });
    let response = or_mock(result, "login", || auth.accounts.login(email, password))?;

    start_session(db, auth, &response).await?;
    info!(user_id = %response.as_inner().user.id, mock = response.is_mock(), "user logged in");

    Ok(response)
}

#[tracing::instrument(skip(db, remote, auth, password, confirm_password))]
pub async fn register(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    auth: &AuthState,
    email: &str,
    password: &str,
    confirm_password: Option<&str>,
    full_name: &str,
) -> Result<Sourced<AuthResponse>, Error> {
    require_field(full_name, "fullName")?;
    require_field(email, "email")?;
    require_field(password, "password")?;
    validate_new_password(password, confirm_password)?;

    let result = remote
        .register(email, password, full_name)
        .await
        .map_err(|err| {
            if is_rejection(&err, &[400, 409]) {
                Error::EmailAlreadyInUse {
                    email: email.to_owned(),
                }
            } else {
                err
            }
        });
    let response = or_mock(result, "registration", || {
        auth.accounts.register(email, password, full_name)
    })?;

    start_session(db, auth, &response).await?;
    info!(user_id = %response.as_inner().user.id, mock = response.is_mock(), "user registered");

    Ok(response)
}

async fn start_session(
    db: &dyn Database,
    auth: &AuthState,
    response: &Sourced<AuthResponse>,
) -> Result<(), Error> {
    db::store_token(db, &response.as_inner().token).await?;
    auth.set_user(Some(response.clone().map(|response| response.user)));

    Ok(())
}

#[tracing::instrument(skip(db, auth))]
pub async fn logout(db: &dyn Database, auth: &AuthState) -> Result<(), Error> {
    db::remove_token(db).await?;
    auth.set_user(None);
    info!("user logged out");

    Ok(())
}

/// Always reports success so callers cannot tell which emails exist.
#[tracing::instrument(skip(remote))]
pub async fn forgot_password(remote: &dyn RemoteApi, email: &str) -> Result<(), Error> {
    require_field(email, "email")?;

    if let Err(err) = remote.forgot_password(email).await {
        warn!(error = %err, "forgot password request failed, reporting success anyway");
    }

    Ok(())
}

#[tracing::instrument(skip(remote, auth, token, new_password, confirm_password))]
pub async fn reset_password(
    remote: &dyn RemoteApi,
    auth: &AuthState,
    token: &str,
    new_password: &str,
    confirm_password: Option<&str>,
) -> Result<Sourced<()>, Error> {
    require_field(token, "token")?;
    validate_new_password(new_password, confirm_password)?;

    let result = remote
        .reset_password(token, new_password)
        .await
        .map_err(|err| {
            if is_rejection(&err, &[400, 401, 403, 404, 410]) {
                Error::InvalidResetToken
            } else {
                err
            }
        });

    or_mock(result, "password reset", || auth.accounts.reset_password(token))
}

/// Returns the signed-in user, restoring it from the persisted token when
/// the service has not seen it yet.
#[tracing::instrument(skip(db, remote, auth))]
pub async fn current_user(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    auth: &AuthState,
) -> Result<Sourced<User>, Error> {
    if let Some(user) = auth.user() {
        return Ok(user);
    }

    let token = db::assert_authenticated(db).await?;

    let user = match remote.current_user(&token).await {
        Err(err) if !err.is_backend_unavailable() && err.remote_status().is_some() => {
            info!(error = %err, "persisted token was rejected, clearing it");
            db::remove_token(db).await?;
            return Err(Error::NotAuthenticated);
        }
        result => or_mock(result, "current user lookup", || {
            Ok(auth.accounts.session_user())
        })?,
    };

    auth.set_user(Some(user.clone()));

    Ok(user)
}

/// Merges the patch into the current user. The backend is told about it on a
/// best-effort basis only.
#[tracing::instrument(skip(db, remote, auth))]
pub async fn update_user(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    auth: &AuthState,
    patch: UserPatch,
) -> Result<Sourced<User>, Error> {
    current_user(db, remote, auth).await?;
    let token = db::assert_authenticated(db).await?;

    let user = auth
        .update_user(patch.clone())
        .ok_or(Error::NotAuthenticated)?;

    match remote.update_profile(&token, &patch).await {
        Ok(profile) => debug!(user_id = %profile.id, "backend accepted profile update"),
        Err(err) => warn!(error = %err, "profile update was not forwarded"),
    }

    Ok(user)
}

#[tracing::instrument(skip(db, remote, current_password, new_password, confirm_password))]
pub async fn update_password(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    current_password: &str,
    new_password: &str,
    confirm_password: Option<&str>,
) -> Result<Sourced<()>, Error> {
    let token = db::assert_authenticated(db).await?;
    require_field(current_password, "currentPassword")?;
    validate_new_password(new_password, confirm_password)?;

    let result = remote
        .update_password(&token, current_password, new_password)
        .await;

    or_mock(result, "password update", || Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::mock::MOCK_TOKEN;
    use crate::database::MemoryDatabase;
    use crate::remote::test::MockRemote;
    use std::sync::{Arc, Mutex};

    fn remote_user() -> User {
        User {
            id: "remote-7".into(),
            email: "someone@example.com".into(),
            full_name: "Some One".into(),
            profile_image: None,
        }
    }

    #[tokio::test]
    async fn login_with_demo_credentials_works_without_backend() {
        let db = MemoryDatabase::new();
        let remote = MockRemote::new();
        let auth = AuthState::new();

        let response = login(&db, &remote, &auth, "demo@example.com", "password123")
            .await
            .unwrap();

        assert!(response.is_mock());
        assert_eq!(response.as_inner().user.id, "user-1");
        assert_eq!(
            db::fetch_token(&db).await.unwrap(),
            Some(MOCK_TOKEN.to_string())
        );
        assert_eq!(auth.user().unwrap().as_inner().email, "demo@example.com");
    }

    #[tokio::test]
    async fn login_prefers_the_backend() {
        let db = MemoryDatabase::new();
        let mut remote = MockRemote::new();
        let called_login = Arc::new(Mutex::new(false));
        let called_login_clone = Arc::clone(&called_login);
        remote.on_login = Box::new(move |(email, _password)| {
            *called_login_clone.lock().unwrap() = true;
            assert_eq!(email, "someone@example.com");
            Ok(AuthResponse {
                user: remote_user(),
                token: "real-token".into(),
            })
        });
        let auth = AuthState::new();

        let response = login(&db, &remote, &auth, "someone@example.com", "secret")
            .await
            .unwrap();

        assert_eq!(
            response,
            Sourced::Remote(AuthResponse {
                user: remote_user(),
                token: "real-token".into(),
            })
        );
        assert!(*called_login.lock().unwrap(), "remote.login was not called");
    }

    #[tokio::test]
    async fn login_rejected_by_backend_does_not_fall_back() {
        let db = MemoryDatabase::new();
        let mut remote = MockRemote::new();
        remote.on_login = Box::new(|_| Err(Error::RemoteRejected { status: 401 }));
        let auth = AuthState::new();

        let result = login(&db, &remote, &auth, "demo@example.com", "password123").await;

        assert_eq!(result.unwrap_err(), Error::InvalidCredentials);
        assert_eq!(db::fetch_token(&db).await.unwrap(), None);
        assert!(auth.user().is_none());
    }

    #[tokio::test]
    async fn login_with_unknown_credentials_fails() {
        let db = MemoryDatabase::new();
        let remote = MockRemote::new();
        let auth = AuthState::new();

        let result = login(&db, &remote, &auth, "demo@example.com", "nope").await;

        assert_eq!(result.unwrap_err(), Error::InvalidCredentials);
    }

    #[tokio::test]
    async fn register_validates_before_calling_backend() {
        let db = MemoryDatabase::new();
        let mut remote = MockRemote::new();
        remote.on_register = Box::new(|_| panic!("remote.register should not be called"));
        let auth = AuthState::new();

        let result = register(
            &db,
            &remote,
            &auth,
            "new@example.com",
            "short",
            Some("short"),
            "New Person",
        )
        .await;
        assert_eq!(
            result.unwrap_err(),
            Error::PasswordTooShort { minimum_length: 8 }
        );

        let result = register(
            &db,
            &remote,
            &auth,
            "new@example.com",
            "long enough",
            Some("long enuff"),
            "New Person",
        )
        .await;
        assert_eq!(result.unwrap_err(), Error::PasswordsDoNotMatch);

        let result = register(
            &db,
            &remote,
            &auth,
            "new@example.com",
            "long enough",
            None,
            "  ",
        )
        .await;
        assert_eq!(
            result.unwrap_err(),
            Error::MissingRequiredField { field: "fullName" }
        );
    }

    #[tokio::test]
    async fn register_falls_back_to_mock_accounts() {
        let db = MemoryDatabase::new();
        let remote = MockRemote::new();
        let auth = AuthState::new();

        let response = register(
            &db,
            &remote,
            &auth,
            "new@example.com",
            "long enough",
            Some("long enough"),
            "New Person",
        )
        .await
        .unwrap();
        assert!(response.is_mock());
        assert_eq!(response.as_inner().user.id, "user-3");

        logout(&db, &auth).await.unwrap();
        login(&db, &remote, &auth, "new@example.com", "long enough")
            .await
            .expect("mock registration should allow login");

        let result = register(
            &db,
            &remote,
            &auth,
            "demo@example.com",
            "long enough",
            None,
            "Copycat",
        )
        .await;
        assert_eq!(
            result.unwrap_err(),
            Error::EmailAlreadyInUse {
                email: "demo@example.com".into()
            }
        );
    }

    #[tokio::test]
    async fn logout_clears_token_and_user() {
        let db = MemoryDatabase::new();
        let remote = MockRemote::new();
        let auth = AuthState::new();
        login(&db, &remote, &auth, "demo@example.com", "password123")
            .await
            .unwrap();

        logout(&db, &auth).await.unwrap();

        assert_eq!(db::fetch_token(&db).await.unwrap(), None);
        assert!(auth.user().is_none());
        assert_eq!(
            current_user(&db, &remote, &auth).await.unwrap_err(),
            Error::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn forgot_password_always_succeeds() {
        let mut remote = MockRemote::new();
        assert!(forgot_password(&remote, "nobody@example.com").await.is_ok());

        remote.on_forgot_password = Box::new(|_| Err(Error::RemoteRejected { status: 404 }));
        assert!(forgot_password(&remote, "nobody@example.com").await.is_ok());

        remote.on_forgot_password = Box::new(|_| Ok(()));
        assert!(forgot_password(&remote, "demo@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn reset_password_mock_only_accepts_known_token() {
        let remote = MockRemote::new();
        let auth = AuthState::new();

        let result = reset_password(&remote, &auth, "valid-token", "new password", None).await;
        assert_eq!(result.unwrap(), Sourced::Mock(()));

        let result = reset_password(&remote, &auth, "stale-token", "new password", None).await;
        assert_eq!(result.unwrap_err(), Error::InvalidResetToken);
    }

    #[tokio::test]
    async fn current_user_is_restored_from_persisted_token() {
        let db = MemoryDatabase::new();
        db::store_token(&db, "real-token").await.unwrap();
        let mut remote = MockRemote::new();
        remote.on_current_user = Box::new(|token| {
            assert_eq!(token, "real-token");
            Ok(remote_user())
        });
        let auth = AuthState::new();

        let user = current_user(&db, &remote, &auth).await.unwrap();

        assert_eq!(user, Sourced::Remote(remote_user()));
        assert_eq!(auth.user(), Some(Sourced::Remote(remote_user())));
    }

    #[tokio::test]
    async fn current_user_falls_back_to_demo_profile() {
        let db = MemoryDatabase::new();
        db::store_token(&db, MOCK_TOKEN).await.unwrap();
        let remote = MockRemote::new();
        let auth = AuthState::new();

        let user = current_user(&db, &remote, &auth).await.unwrap();

        assert!(user.is_mock());
        assert_eq!(user.as_inner().id, "user-1");
    }

    #[tokio::test]
    async fn rejected_token_is_cleared() {
        let db = MemoryDatabase::new();
        db::store_token(&db, "expired").await.unwrap();
        let mut remote = MockRemote::new();
        remote.on_current_user = Box::new(|_| Err(Error::RemoteRejected { status: 401 }));
        let auth = AuthState::new();

        let result = current_user(&db, &remote, &auth).await;

        assert_eq!(result.unwrap_err(), Error::NotAuthenticated);
        assert_eq!(db::fetch_token(&db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_user_merges_locally_even_if_backend_is_down() {
        let db = MemoryDatabase::new();
        let remote = MockRemote::new();
        let auth = AuthState::new();
        login(&db, &remote, &auth, "demo@example.com", "password123")
            .await
            .unwrap();

        let user = update_user(
            &db,
            &remote,
            &auth,
            UserPatch {
                profile_image: Some("https://example.com/me.png".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(user.as_inner().full_name, "Demo User");
        assert_eq!(
            user.as_inner().profile_image.as_deref(),
            Some("https://example.com/me.png")
        );
    }

    #[tokio::test]
    async fn update_user_requires_session() {
        let db = MemoryDatabase::new();
        let remote = MockRemote::new();
        let auth = AuthState::new();

        let result = update_user(&db, &remote, &auth, UserPatch::default()).await;

        assert_eq!(result.unwrap_err(), Error::NotAuthenticated);
    }
}
