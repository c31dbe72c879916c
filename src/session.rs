//! Cookie sessions backed by the sessions table.
//!
//! The client only holds the session id, in a signed cookie. Every request
//! passes through [`session_layer`], which resumes the session (if any) and
//! hands a [`Session`] handle to the handlers via request extensions. If a
//! handler creates, rotates or drops the row, the layer re-issues or clears
//! the cookie.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config;
use crate::db::{self, sessions, DbLockError, DbPool, LogOnError};
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "sg_session";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Lock(#[from] DbLockError),
    #[error("session store error: {0}")]
    Store(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "success" => FlashKind::Success,
            _ => FlashKind::Error,
        }
    }
}

/// One pending message, shown on the next rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// Handle to the current request's session row.
///
/// A client without a stored row holds a transient handle (`id` is None).
/// The row is only written the first time something needs storing, so
/// requests that never flash, record a path or log in leave no trace.
#[derive(Clone)]
pub struct Session {
    id: Arc<Mutex<Option<String>>>,
    db: DbPool,
    duration_hours: i64,
}

impl Session {
    /// Resume the session named by the cookie. Unknown, expired or absent
    /// cookies give a transient anonymous handle.
    pub fn load(
        db: &DbPool,
        cookie_id: Option<&str>,
        duration_hours: i64,
    ) -> Result<Self, SessionError> {
        let mut id = None;
        if let Some(cookie_id) = cookie_id {
            let conn = db::try_lock(db)?;
            if let Some(row) = sessions::get_session(&conn, cookie_id)? {
                sessions::touch_session(&conn, &row.id, duration_hours)
                    .log_warn("Failed to bump session access");
                id = Some(row.id);
            }
        }

        Ok(Self {
            id: Arc::new(Mutex::new(id)),
            db: db.clone(),
            duration_hours,
        })
    }

    /// Current session id; None until something has been stored
    pub fn id(&self) -> Option<String> {
        self.id
            .lock()
            .map(|id| id.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn set_id(&self, new_id: Option<String>) {
        match self.id.lock() {
            Ok(mut id) => *id = new_id,
            Err(poisoned) => *poisoned.into_inner() = new_id,
        }
    }

    /// Id of the stored row, writing a fresh anonymous row if there is none yet
    fn ensure_row(&self, conn: &Connection) -> Result<String, SessionError> {
        if let Some(id) = self.id() {
            return Ok(id);
        }

        // Clean up expired sessions occasionally (~10% chance)
        if rand::random::<u8>() < config::SESSION_CLEANUP_THRESHOLD {
            if let Ok(count) = sessions::cleanup_expired_sessions(conn) {
                tracing::debug!("Removed {} expired sessions", count);
            }
        }

        let id = generate_session_id();
        sessions::create_session(conn, &id, self.duration_hours)?;
        self.set_id(Some(id.clone()));
        Ok(id)
    }

    pub fn user_id(&self) -> Result<Option<i64>, SessionError> {
        let Some(id) = self.id() else {
            return Ok(None);
        };
        let conn = db::try_lock(&self.db)?;
        Ok(sessions::get_session_user_id(&conn, &id)?)
    }

    /// Bind `user_id` to this session under a fresh id
    pub fn authenticate(&self, user_id: i64) -> Result<(), SessionError> {
        let conn = db::try_lock(&self.db)?;
        let old_id = self.ensure_row(&conn)?;
        let new_id = generate_session_id();
        if !sessions::promote_session(&conn, &old_id, &new_id, user_id)? {
            // Row vanished mid-request (expired and purged); start over
            sessions::create_session(&conn, &new_id, self.duration_hours)?;
            sessions::promote_session(&conn, &new_id, &new_id, user_id)?;
        }
        drop(conn);
        self.set_id(Some(new_id));
        Ok(())
    }

    /// Drop the stored row; the handle continues as a transient anonymous one
    pub fn destroy(&self) -> Result<(), SessionError> {
        if let Some(id) = self.id() {
            let conn = db::try_lock(&self.db)?;
            sessions::delete_session(&conn, &id)?;
        }
        self.set_id(None);
        Ok(())
    }

    /// Remember where to go after login. Keeps an already-pending path.
    pub fn record_return_to(&self, path: &str) -> Result<bool, SessionError> {
        let conn = db::try_lock(&self.db)?;
        let id = self.ensure_row(&conn)?;
        Ok(sessions::set_return_to_if_absent(&conn, &id, path)?)
    }

    pub fn take_return_to(&self) -> Result<Option<String>, SessionError> {
        let Some(id) = self.id() else {
            return Ok(None);
        };
        let conn = db::try_lock(&self.db)?;
        Ok(sessions::take_return_to(&conn, &id)?)
    }

    pub fn flash(&self, flash: Flash) -> Result<(), SessionError> {
        let conn = db::try_lock(&self.db)?;
        let id = self.ensure_row(&conn)?;
        sessions::set_flash(&conn, &id, flash.kind.as_str(), &flash.message)?;
        Ok(())
    }

    pub fn take_flash(&self) -> Result<Option<Flash>, SessionError> {
        let Some(id) = self.id() else {
            return Ok(None);
        };
        let conn = db::try_lock(&self.db)?;
        Ok(sessions::take_flash(&conn, &id)?.map(|(kind, message)| Flash {
            kind: FlashKind::parse(&kind),
            message,
        }))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Session layer missing"))
    }
}

/// Middleware: attach a [`Session`] to the request and keep the cookie in sync
pub async fn session_layer(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_id = jar.get(SESSION_COOKIE_NAME).map(|c| c.value().to_string());
    let duration_hours = state.config.session.duration_hours;

    let session = match Session::load(&state.auth_db, cookie_id.as_deref(), duration_hours) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to load session: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Session store unavailable").into_response();
        }
    };

    request.extensions_mut().insert(session.clone());
    let response = next.run(request).await;

    let current_id = session.id();
    if cookie_id == current_id {
        return response;
    }

    let jar = match current_id {
        Some(id) => jar.add(
            Cookie::build((SESSION_COOKIE_NAME, id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(false) // Set to true in production with HTTPS
                .max_age(time::Duration::hours(duration_hours))
                .build(),
        ),
        // Stale or destroyed session; stop sending it
        None => jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/")),
    };
    (jar, response).into_response()
}

/// Generate a new session ID
pub fn generate_session_id() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..32)
        .map(|_| {
            let idx = rng.random_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}
