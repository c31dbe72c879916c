//! Session rows.
//!
//! A row exists only once a client has something stored (a return path, a
//! flash or a login). `user_id` is NULL while the client is anonymous;
//! `return_to` and the flash columns hold transient state between two
//! requests.

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

/// A live (unexpired) session row
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub id: String,
    pub user_id: Option<i64>,
    pub return_to: Option<String>,
}

/// Create an anonymous session
pub fn create_session(conn: &Connection, session_id: &str, duration_hours: i64) -> Result<()> {
    let now = Utc::now();
    let expires = now + Duration::hours(duration_hours);
    conn.execute(
        "INSERT INTO sessions (id, user_id, created_at, expires_at, last_access_at) VALUES (?1, NULL, ?2, ?3, ?4)",
        params![
            session_id,
            now.to_rfc3339(),
            expires.to_rfc3339(),
            now.to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Load an unexpired session
pub fn get_session(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
    let now = Utc::now().to_rfc3339();
    conn.query_row(
        "SELECT id, user_id, return_to FROM sessions WHERE id = ?1 AND expires_at > ?2",
        params![session_id, now],
        |row| {
            Ok(SessionRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                return_to: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Record an access and push expiry `duration_hours` past it (sliding expiry)
pub fn touch_session(conn: &Connection, session_id: &str, duration_hours: i64) -> Result<()> {
    let now = Utc::now();
    let expires = now + Duration::hours(duration_hours);
    conn.execute(
        "UPDATE sessions SET last_access_at = ?1, expires_at = ?2 WHERE id = ?3",
        params![now.to_rfc3339(), expires.to_rfc3339(), session_id],
    )?;
    Ok(())
}

/// User bound to a session, if any
pub fn get_session_user_id(conn: &Connection, session_id: &str) -> Result<Option<i64>> {
    let user_id: Option<Option<i64>> = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(user_id.flatten())
}

/// Bind a user to a session and move it to a fresh id in one statement.
/// Returns false if the old session no longer exists.
pub fn promote_session(
    conn: &Connection,
    old_id: &str,
    new_id: &str,
    user_id: i64,
) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let count = conn.execute(
        "UPDATE sessions SET id = ?1, user_id = ?2, last_access_at = ?3 WHERE id = ?4",
        params![new_id, user_id, now, old_id],
    )?;
    Ok(count > 0)
}

/// Store a return path unless one is already pending. Returns true if stored.
pub fn set_return_to_if_absent(conn: &Connection, session_id: &str, path: &str) -> Result<bool> {
    let count = conn.execute(
        "UPDATE sessions SET return_to = ?1 WHERE id = ?2 AND return_to IS NULL",
        params![path, session_id],
    )?;
    Ok(count > 0)
}

/// Remove and return the pending return path
pub fn take_return_to(conn: &Connection, session_id: &str) -> Result<Option<String>> {
    let path: Option<Option<String>> = conn
        .query_row(
            "SELECT return_to FROM sessions WHERE id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;
    conn.execute(
        "UPDATE sessions SET return_to = NULL WHERE id = ?1",
        params![session_id],
    )?;
    Ok(path.flatten())
}

/// Replace the pending flash message
pub fn set_flash(conn: &Connection, session_id: &str, kind: &str, message: &str) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET flash_kind = ?1, flash_message = ?2 WHERE id = ?3",
        params![kind, message, session_id],
    )?;
    Ok(())
}

/// Remove and return the pending flash as (kind, message)
pub fn take_flash(conn: &Connection, session_id: &str) -> Result<Option<(String, String)>> {
    let flash: Option<(Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT flash_kind, flash_message FROM sessions WHERE id = ?1",
            params![session_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    conn.execute(
        "UPDATE sessions SET flash_kind = NULL, flash_message = NULL WHERE id = ?1",
        params![session_id],
    )?;
    Ok(match flash {
        Some((Some(kind), Some(message))) => Some((kind, message)),
        _ => None,
    })
}

/// Delete a session (logout)
pub fn delete_session(conn: &Connection, session_id: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
    Ok(())
}

/// Cleanup expired sessions, returns count of deleted sessions
pub fn cleanup_expired_sessions(conn: &Connection) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let count = conn.execute("DELETE FROM sessions WHERE expires_at < ?1", params![now])?;
    Ok(count)
}
