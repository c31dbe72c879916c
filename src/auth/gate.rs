//! Session authentication gate.
//!
//! A session is either [`GateState::Anonymous`] or
//! [`GateState::Authenticated`]. Protected handlers take an [`AuthUser`]
//! parameter; when the session is anonymous the extractor hands the request
//! to the configured [`FailureHandler`] instead of running the handler.
//!
//! Every transition resolves to a redirect plus a flash message. Nothing in
//! here turns an authentication problem into an error status.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use super::verifier::UserIdentity;
use crate::db::{self, users, LogOnError};
use crate::session::{Flash, Session, SessionError};
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/auth/login";
pub const LANDING_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Anonymous,
    Authenticated(i64),
}

/// Raw credentials from one login form submission; never stored
#[derive(Deserialize)]
pub struct AuthAttempt {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for AuthAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthAttempt")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the gate knows when it gives up on a request
#[derive(Debug, Clone, Default)]
pub struct FailureContext {
    /// Path the client was trying to reach, if it should be returned to
    pub attempted_path: Option<String>,
    /// Specific reason; the handler's default message is used when absent
    pub message: Option<String>,
}

/// Invoked by the gate for every authentication failure
pub trait FailureHandler: Send + Sync {
    fn on_failure(&self, session: &Session, context: FailureContext) -> Response;
}

/// Remember the attempted path, flash the reason, send the client to login
pub struct RedirectToLogin {
    default_message: String,
}

impl RedirectToLogin {
    pub fn new(default_message: impl Into<String>) -> Self {
        Self {
            default_message: default_message.into(),
        }
    }
}

impl FailureHandler for RedirectToLogin {
    fn on_failure(&self, session: &Session, context: FailureContext) -> Response {
        if let Some(path) = context.attempted_path.as_deref().filter(|p| is_local_path(p)) {
            if let Some(true) = session.record_return_to(path).log_warn("Failed to record return path") {
                tracing::debug!("Recorded return path {}", path);
            }
        }

        let message = context.message.unwrap_or_else(|| self.default_message.clone());
        session
            .flash(Flash::error(message))
            .log_warn("Failed to store flash message");

        Redirect::to(LOGIN_PATH).into_response()
    }
}

/// Only same-site absolute paths are followed after login
pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

/// Where the session stands right now
pub fn current_state(session: &Session) -> Result<GateState, SessionError> {
    Ok(match session.user_id()? {
        Some(user_id) => GateState::Authenticated(user_id),
        None => GateState::Anonymous,
    })
}

/// Resolve the session to a user. A session whose user no longer exists
/// counts as anonymous.
pub fn current_user(state: &AppState, session: &Session) -> Result<Option<UserIdentity>, SessionError> {
    let GateState::Authenticated(user_id) = current_state(session)? else {
        return Ok(None);
    };
    let conn = db::try_lock(&state.auth_db)?;
    Ok(users::get_user_by_id(&conn, user_id)?.map(|(id, username)| UserIdentity { id, username }))
}

/// Anonymous --(login submission)--> Authenticated | Anonymous
pub fn login(state: &AppState, session: &Session, attempt: &AuthAttempt) -> Response {
    let identity = match state.verifier.verify(&attempt.username, &attempt.password) {
        Ok(identity) => identity,
        Err(err) => {
            tracing::info!("Login failed for '{}': {}", attempt.username, err);
            return state.failure_handler.on_failure(
                session,
                FailureContext {
                    attempted_path: None,
                    message: Some(err.message(&state.config.messages).to_string()),
                },
            );
        }
    };

    if let Err(e) = session.authenticate(identity.id) {
        tracing::error!("Failed to bind session for '{}': {}", identity.username, e);
        return state.failure_handler.on_failure(
            session,
            FailureContext {
                attempted_path: None,
                message: Some(state.config.messages.store_unavailable.clone()),
            },
        );
    }

    // Update last login time (log but don't fail on error)
    if let Some(conn) = db::try_lock(&state.auth_db).log_warn("Failed to lock db for last login") {
        users::update_last_login(&conn, identity.id).log_warn("Failed to update last login");
    }

    let target = session
        .take_return_to()
        .log_warn("Failed to read return path")
        .flatten()
        .filter(|p| is_local_path(p))
        .unwrap_or_else(|| LANDING_PATH.to_string());

    session
        .flash(Flash::success(state.config.messages.logged_in.clone()))
        .log_warn("Failed to store flash message");

    tracing::info!("User '{}' logged in", identity.username);
    Redirect::to(&target).into_response()
}

/// Authenticated --(logout)--> Anonymous. Also fine when already anonymous.
pub fn logout(state: &AppState, session: &Session) -> Response {
    match current_state(session) {
        Ok(GateState::Authenticated(user_id)) => tracing::info!("User {} logged out", user_id),
        Ok(GateState::Anonymous) => tracing::debug!("Logout from anonymous session"),
        Err(e) => tracing::warn!("Failed to read session during logout: {}", e),
    }

    session.destroy().log_warn("Failed to destroy session");
    session
        .flash(Flash::success(state.config.messages.logged_out.clone()))
        .log_warn("Failed to store flash message");

    Redirect::to(LANDING_PATH).into_response()
}

/// Authenticated user for protected handlers.
/// Anonymous requests are handed to the failure handler with their path.
pub struct AuthUser(pub UserIdentity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let attempted_path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        let message = match current_user(state, &session) {
            Ok(Some(identity)) => return Ok(AuthUser(identity)),
            Ok(None) => None,
            Err(e) => {
                tracing::error!("Failed to resolve session user: {}", e);
                Some(state.config.messages.store_unavailable.clone())
            }
        };

        Err(state.failure_handler.on_failure(
            &session,
            FailureContext {
                attempted_path: Some(attempted_path),
                message,
            },
        ))
    }
}
