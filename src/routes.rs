//! Router assembly.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{auth, handlers, session, state::AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/auth/login", get(auth::login_page).post(auth::login_submit))
        .route("/auth/logout", get(auth::logout))
        .route("/auth/unauthenticated", post(auth::unauthenticated))
        .route("/protected", get(handlers::protected))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_layer,
        ))
        // Added after the session layer so it stays outside it
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
