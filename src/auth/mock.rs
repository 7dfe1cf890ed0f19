use std::sync::Mutex;

use crate::error::Error;

use super::{AuthResponse, User};

pub const MOCK_TOKEN: &str = "mock-jwt-token";
pub const MOCK_RESET_TOKEN: &str = "valid-token";

#[derive(Clone, Debug)]
struct MockAccount {
    id: String,
    email: String,
    password: String,
    full_name: String,
}

impl MockAccount {
    fn user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            profile_image: None,
        }
    }
}

/// Accounts that stand in for the backend's user directory while it is
/// unreachable. Registrations only last as long as the process.
#[derive(Debug)]
pub struct MockAccounts {
    accounts: Mutex<Vec<MockAccount>>,
}

impl Default for MockAccounts {
    fn default() -> MockAccounts {
        let account = |id: &str, email: &str, password: &str, full_name: &str| MockAccount {
            id: id.into(),
            email: email.into(),
            password: password.into(),
            full_name: full_name.into(),
        };

        MockAccounts {
            accounts: Mutex::new(vec![
                account("user-1", "demo@example.com", "password123", "Demo User"),
                account("user-2", "test@example.com", "test123", "Test User"),
            ]),
        }
    }
}

impl MockAccounts {
    pub fn login(&self, email: &str, password: &str) -> Result<AuthResponse, Error> {
        let accounts = self.accounts.lock().unwrap();
        let account = accounts
            .iter()
            .find(|account| account.email == email && account.password == password)
            .ok_or(Error::InvalidCredentials)?;

        Ok(AuthResponse {
            user: account.user(),
            token: MOCK_TOKEN.into(),
        })
    }

    pub fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthResponse, Error> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.iter().any(|account| account.email == email) {
            return Err(Error::EmailAlreadyInUse {
                email: email.into(),
            });
        }

        let account = MockAccount {
            id: format!("user-{}", accounts.len() + 1),
            email: email.into(),
            password: password.into(),
            full_name: full_name.into(),
        };
        let user = account.user();
        accounts.push(account);

        Ok(AuthResponse {
            user,
            token: MOCK_TOKEN.into(),
        })
    }

    /// The profile handed out when a persisted token cannot be checked.
    pub fn session_user(&self) -> User {
        let accounts = self.accounts.lock().unwrap();
        match accounts.first() {
            Some(account) => account.user(),
            None => User {
                id: "user-1".into(),
                email: "demo@example.com".into(),
                full_name: "Demo User".into(),
                profile_image: None,
            },
        }
    }

    pub fn reset_password(&self, token: &str) -> Result<(), Error> {
        if token != MOCK_RESET_TOKEN {
            return Err(Error::InvalidResetToken);
        }

        Ok(())
    }
}
