//! Test utilities for database setup.
//!
//! Reuses the authoritative schema initialization so tests never carry
//! their own copy of the tables.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::auth::password;
use crate::db::{self, DbPool};

/// Test environment with an app.db in a temporary directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for database file persistence)
    pub temp: TempDir,
    /// app.db connection with the full schema (all migrations)
    pub conn: Connection,
}

impl TestEnv {
    pub fn new() -> rusqlite::Result<Self> {
        let temp =
            TempDir::new().map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let conn = Connection::open(temp.path().join("app.db"))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        db::run_migrations(&conn)?;

        Ok(Self { temp, conn })
    }

    /// Create a user with a real Argon2 hash of `password`
    pub fn add_user(&self, username: &str, password: &str) -> i64 {
        let hash = password::hash_password(password).expect("hash test password");
        db::users::create_user(&self.conn, username, &hash).expect("create test user")
    }

    /// Hand the connection over as a shared pool (keeps the temp dir alive)
    pub fn into_pool(self) -> (TempDir, DbPool) {
        (self.temp, Arc::new(Mutex::new(self.conn)))
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}
