//! Credential verification.
//!
//! A [`Verifier`] turns a username/password pair into a [`UserIdentity`] or
//! an [`AuthError`]. Which implementation runs is chosen by the `[auth]
//! strategy` config key.

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use super::password;
use crate::config::Messages;
use crate::db::{self, users, DbLockError, DbPool};

/// The authenticated user, as handed to the session gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username is required")]
    MissingUsername,
    #[error("password is required")]
    MissingPassword,
    #[error("no such user")]
    UnknownUser,
    #[error("password does not match")]
    InvalidCredentials,
    #[error("user store unavailable: {0}")]
    Store(String),
}

impl From<rusqlite::Error> for AuthError {
    fn from(e: rusqlite::Error) -> Self {
        AuthError::Store(e.to_string())
    }
}

impl From<DbLockError> for AuthError {
    fn from(e: DbLockError) -> Self {
        AuthError::Store(e.to_string())
    }
}

impl AuthError {
    /// User-facing text for this failure
    pub fn message<'a>(&self, messages: &'a Messages) -> &'a str {
        match self {
            AuthError::MissingUsername => &messages.missing_username,
            AuthError::MissingPassword => &messages.missing_password,
            AuthError::UnknownUser => &messages.unknown_user,
            AuthError::InvalidCredentials => &messages.invalid_credentials,
            AuthError::Store(_) => &messages.store_unavailable,
        }
    }
}

/// Checks one set of credentials. Must be read-only and deterministic for
/// a given stored state.
pub trait Verifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> Result<UserIdentity, AuthError>;
}

/// Username + Argon2 password hash, looked up in the users table
pub struct PasswordVerifier {
    db: DbPool,
}

impl PasswordVerifier {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl Verifier for PasswordVerifier {
    fn verify(&self, username: &str, password: &str) -> Result<UserIdentity, AuthError> {
        if username.is_empty() {
            return Err(AuthError::MissingUsername);
        }
        if password.is_empty() {
            return Err(AuthError::MissingPassword);
        }

        let user = {
            let conn = db::try_lock(&self.db)?;
            users::get_user_by_username(&conn, username)?
        }
        .ok_or(AuthError::UnknownUser)?;

        // Argon2 is slow on purpose; the lock is already released here
        if !password::verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(UserIdentity {
            id: user.id,
            username: user.username,
        })
    }
}

/// Named verifier strategies selectable from config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Password,
}

impl Strategy {
    pub fn build(self, db: DbPool) -> Arc<dyn Verifier> {
        match self {
            Strategy::Password => Arc::new(PasswordVerifier::new(db)),
        }
    }
}
