//! Application state shared by all handlers.

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

use crate::auth::gate::{FailureHandler, RedirectToLogin};
use crate::auth::verifier::Verifier;
use crate::config::{self, Config};
use crate::db::DbPool;

/// Application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared auth database (users, sessions)
    pub auth_db: DbPool,

    /// Signs the session cookie
    pub cookie_key: Key,

    /// Credential check selected by `[auth] strategy`
    pub verifier: Arc<dyn Verifier>,

    /// What the gate does with an unauthenticated request
    pub failure_handler: Arc<dyn FailureHandler>,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, auth_db: DbPool) -> Self {
        let verifier = config.auth.strategy.build(auth_db.clone());
        let failure_handler = Arc::new(RedirectToLogin::new(config.messages.must_log_in.clone()));
        Self {
            cookie_key: cookie_key(config.session.secret.as_deref()),
            auth_db,
            verifier,
            failure_handler,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Build the cookie signing key from the configured secret.
/// Short or absent secrets get a random per-process key, which logs
/// everyone out on restart.
fn cookie_key(secret: Option<&str>) -> Key {
    match secret {
        Some(secret) if secret.len() >= config::MIN_SECRET_LEN => Key::from(secret.as_bytes()),
        Some(_) => {
            tracing::warn!(
                "Session secret shorter than {} bytes, using a random key",
                config::MIN_SECRET_LEN
            );
            Key::generate()
        }
        None => {
            tracing::warn!("No session secret configured, using a random key");
            Key::generate()
        }
    }
}
