use std::collections::HashMap;

use async_trait::async_trait;
use pact_core::{AuthError, IdentityService};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user_id: String,
    password_digest: String,
}

/// Email/password accounts held in memory. Passwords are only kept as
/// salted SHA-256 digests.
#[derive(Default)]
pub struct InMemoryIdentityService {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::InvalidEmail),
    }
}

fn digest(user_id: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = normalize_email(email)?;
        let accounts = self.accounts.read().await;
        let account = accounts.get(&email).ok_or(AuthError::InvalidCredentials)?;

        if account.password_digest != digest(&account.user_id, password) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(account.user_id.clone())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min_len: MIN_PASSWORD_LEN,
            });
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse);
        }

        let user_id = Uuid::new_v4().simple().to_string();
        accounts.insert(
            email,
            Account {
                password_digest: digest(&user_id, password),
                user_id: user_id.clone(),
            },
        );
        Ok(user_id)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
