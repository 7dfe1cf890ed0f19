use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::remote::Sourced;

pub mod db;
pub mod endpoints;
pub mod manager;
pub mod mock;
pub use endpoints::*;

use self::mock::MockAccounts;

pub const MINIMUM_PASSWORD_LENGTH: usize = 8;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

impl User {
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(full_name) = patch.full_name {
            self.full_name = full_name;
        }
        if let Some(profile_image) = patch.profile_image {
            self.profile_image = Some(profile_image);
        }
    }
}

/// A partial update of the current user; absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// The signed-in user for this service instance. The bearer token lives in
/// the persisted store; the user is only held in memory.
#[derive(Debug, Default)]
pub struct AuthState {
    user: Mutex<Option<Sourced<User>>>,
    pub accounts: MockAccounts,
}

impl AuthState {
    pub fn new() -> AuthState {
        AuthState::default()
    }

    pub fn user(&self) -> Option<Sourced<User>> {
        self.user.lock().unwrap().clone()
    }

    pub fn set_user(&self, user: Option<Sourced<User>>) {
        *self.user.lock().unwrap() = user;
    }

    /// Applies the patch to the current user, if there is one.
    pub fn update_user(&self, patch: UserPatch) -> Option<Sourced<User>> {
        let mut current = self.user.lock().unwrap();
        let user = current.as_mut()?;
        user.as_inner_mut().apply(patch);
        Some(user.clone())
    }
}

pub fn require_field(value: &str, field: &'static str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::MissingRequiredField { field });
    }

    Ok(())
}

pub fn validate_new_password(password: &str, confirmation: Option<&str>) -> Result<(), Error> {
    if password.chars().count() < MINIMUM_PASSWORD_LENGTH {
        return Err(Error::PasswordTooShort {
            minimum_length: MINIMUM_PASSWORD_LENGTH,
        });
    }

    match confirmation {
        Some(confirmation) if confirmation != password => Err(Error::PasswordsDoNotMatch),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passwords_are_rejected() {
        assert_eq!(
            validate_new_password("short", None),
            Err(Error::PasswordTooShort { minimum_length: 8 })
        );
        assert_eq!(validate_new_password("long enough", None), Ok(()));
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        assert_eq!(
            validate_new_password("password123", Some("password124")),
            Err(Error::PasswordsDoNotMatch)
        );
        assert_eq!(
            validate_new_password("password123", Some("password123")),
            Ok(())
        );
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let state = AuthState::new();
        assert_eq!(state.update_user(UserPatch::default()), None);

        state.set_user(Some(Sourced::Mock(User {
            id: "user-1".into(),
            email: "demo@example.com".into(),
            full_name: "Demo User".into(),
            profile_image: None,
        })));
        let user = state
            .update_user(UserPatch {
                full_name: Some("Renamed".into()),
                ..Default::default()
            })
            .unwrap();

        assert!(user.is_mock());
        assert_eq!(user.as_inner().full_name, "Renamed");
        assert_eq!(user.as_inner().email, "demo@example.com");
        assert_eq!(state.user().unwrap().as_inner().full_name, "Renamed");
    }
}
