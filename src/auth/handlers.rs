//! Authentication handlers for login, logout and the failure target.

use askama::Template;
use axum::{
    extract::{rejection::FormRejection, State},
    response::{Html, Response},
    Form,
};

use super::gate::{self, AuthAttempt, FailureContext};
use crate::db::LogOnError;
use crate::session::{Flash, Session};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub flash: Option<Flash>,
    pub version: &'static str,
}

/// GET /auth/login - Show login page
pub async fn login_page(session: Session) -> Html<String> {
    let template = LoginTemplate {
        flash: session.take_flash().log_warn("Failed to read flash").flatten(),
        version: env!("CARGO_PKG_VERSION"),
    };
    Html(template.render().unwrap_or_default())
}

/// POST /auth/login - Process login.
/// A body that is not a usable login form is an unauthenticated request.
/// Password hashing is slow on purpose, so the gate runs on the blocking pool.
pub async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    form: Result<Form<AuthAttempt>, FormRejection>,
) -> Response {
    let attempt = match form {
        Ok(Form(attempt)) => attempt,
        Err(rejection) => {
            tracing::info!("Rejected login body: {}", rejection);
            return state
                .failure_handler
                .on_failure(&session, FailureContext::default());
        }
    };

    let task = {
        let state = state.clone();
        let session = session.clone();
        tokio::task::spawn_blocking(move || gate::login(&state, &session, &attempt))
    };

    match task.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Login task failed: {}", e);
            state.failure_handler.on_failure(
                &session,
                FailureContext {
                    attempted_path: None,
                    message: Some(state.config.messages.store_unavailable.clone()),
                },
            )
        }
    }
}

/// GET /auth/logout - Log out and clear session
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    gate::logout(&state, &session)
}

/// POST /auth/unauthenticated - Failure target.
/// Reached directly there is no failure context, so only the default
/// message is flashed.
pub async fn unauthenticated(State(state): State<AppState>, session: Session) -> Response {
    state
        .failure_handler
        .on_failure(&session, FailureContext::default())
}
