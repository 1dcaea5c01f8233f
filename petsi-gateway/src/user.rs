//! In-memory user table for the PETSI gateway.
//!
//! Passwords are pre-hashed with SHA-256 and the digest is hashed with
//! Argon2id, stored in PHC string format.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use petsi_common::config::UserConfig;
use petsi_common::{Error, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// User record.
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    /// Login name (an e-mail address for the demo accounts)
    pub username: String,
    pub full_name: String,
    /// Argon2 PHC hash of SHA-256(password)
    pub password_hash: String,
    pub active: bool,
}

/// Public view of a user, as returned by login.
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: u64,
    pub username: String,
    pub full_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
        }
    }
}

/// Read-only user table keyed by username.
#[derive(Clone, Default)]
pub struct UserStore {
    users: Arc<HashMap<String, User>>,
}

impl UserStore {
    /// Build the table from configuration, hashing any plain passwords.
    ///
    /// With no configured users the two demo accounts are seeded.
    pub fn from_config(users: &[UserConfig]) -> Result<Self> {
        if users.is_empty() {
            tracing::info!("No users configured, seeding demo accounts");
            return Self::from_config(&demo_users());
        }

        let mut table = HashMap::with_capacity(users.len());
        for entry in users {
            let password_hash = match (&entry.password_hash, &entry.password) {
                (Some(hash), _) => {
                    PasswordHash::new(hash).map_err(|e| {
                        Error::Config(format!("invalid password_hash for '{}': {e}", entry.username))
                    })?;
                    hash.clone()
                }
                (None, Some(password)) => hash_password(password)?,
                (None, None) => {
                    return Err(Error::Config(format!(
                        "user '{}' has neither password nor password_hash",
                        entry.username
                    )))
                }
            };

            table.insert(
                entry.username.clone(),
                User {
                    id: entry.id,
                    username: entry.username.clone(),
                    full_name: entry.full_name.clone(),
                    password_hash,
                    active: entry.active,
                },
            );
        }

        Ok(Self {
            users: Arc::new(table),
        })
    }

    /// Get a user by username.
    pub fn get(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    /// Verify credentials. Returns the user on success; unknown users,
    /// wrong passwords, and inactive accounts all yield `None`.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&User> {
        let Some(user) = self.users.get(username) else {
            tracing::debug!(username = %username, "Login for unknown user");
            return None;
        };

        if !verify_password(password, &user.password_hash) {
            tracing::debug!(username = %username, "Login with wrong password");
            return None;
        }

        if !user.active {
            tracing::debug!(username = %username, "Login for inactive user");
            return None;
        }

        Some(user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn demo_users() -> Vec<UserConfig> {
    vec![
        UserConfig {
            id: 1,
            username: "admin@gmail.com".into(),
            full_name: "Administrador PETSI".into(),
            password: Some("123456".into()),
            password_hash: None,
            active: true,
        },
        UserConfig {
            id: 2,
            username: "alexis@gmail.com".into(),
            full_name: "Alexis Chiluisa".into(),
            password: Some("password".into()),
            password_hash: None,
            active: true,
        },
    ]
}

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

/// Hash a password using Argon2 over its SHA-256 digest.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(&digest(password), &salt)
        .map_err(|e| Error::Internal(format!("failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(&digest(password), &parsed_hash)
        .is_ok()
}
