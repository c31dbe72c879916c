//! User records.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result};

/// A stored user row
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

/// Create a new user, returns the user ID
pub fn create_user(conn: &Connection, username: &str, password_hash: &str) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
        params![username, password_hash, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get user by exact (case-sensitive) username
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRecord>> {
    conn.query_row(
        "SELECT id, username, password_hash FROM users WHERE username = ?1 COLLATE BINARY",
        params![username],
        |row| {
            Ok(UserRecord {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Get (id, username) for a user id
pub fn get_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<(i64, String)>> {
    conn.query_row(
        "SELECT id, username FROM users WHERE id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

/// Update user's last login timestamp
pub fn update_last_login(conn: &Connection, user_id: i64) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
        params![now, user_id],
    )?;
    Ok(())
}

pub fn get_user_count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

/// Delete a user; their sessions go with them (ON DELETE CASCADE)
#[cfg(test)]
pub fn delete_user(conn: &Connection, user_id: i64) -> Result<bool> {
    let count = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    Ok(count > 0)
}
