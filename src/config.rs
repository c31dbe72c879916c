//! Application configuration.
//!
//! Values are resolved with priority: config.toml > environment (.env) > default.
//! User-visible messages and the verifier strategy are only read from config.toml.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::auth::verifier::Strategy;
use crate::paths;

// ==================== Defaults ====================

/// Server address to bind to
pub const SERVER_ADDR: &str = "0.0.0.0";

/// Server port
pub const SERVER_PORT: u16 = 3000;

/// Session duration in hours (1 week)
pub const SESSION_DURATION_HOURS: i64 = 24 * 7;

/// Probability threshold for expired session cleanup (0-255, lower = less frequent)
/// Value of 25 means ~10% chance (25/256) on each session creation
pub const SESSION_CLEANUP_THRESHOLD: u8 = 25;

/// Minimum length of a session signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    Env { key: &'static str, value: String },
}

// ==================== File structure ====================

/// Configuration file structure for config.toml
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server: Option<ServerSection>,
    database: Option<DatabaseSection>,
    session: Option<SessionSection>,
    #[serde(default)]
    auth: AuthConfig,
    #[serde(default)]
    messages: Messages,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    addr: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionSection {
    duration_hours: Option<i64>,
    secret: Option<String>,
}

// ==================== Resolved configuration ====================

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub server_port: u16,
    pub database_path: PathBuf,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub messages: Messages,
}

#[derive(Clone)]
pub struct SessionConfig {
    pub duration_hours: i64,
    /// Raw signing secret; `None` means a random key per process
    pub secret: Option<String>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("duration_hours", &self.duration_hours)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Verifier selection and the bootstrap user
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub strategy: Strategy,
    pub seed_username: String,
    pub seed_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Password,
            seed_username: "admin".to_string(),
            seed_password: "admin".to_string(),
        }
    }
}

/// Every user-visible message the gate can emit
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub must_log_in: String,
    pub missing_username: String,
    pub missing_password: String,
    pub unknown_user: String,
    pub invalid_credentials: String,
    pub store_unavailable: String,
    pub logged_in: String,
    pub logged_out: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            must_log_in: "You must log in".to_string(),
            missing_username: "Please enter your username.".to_string(),
            missing_password: "Please enter your password.".to_string(),
            unknown_user: "The username you entered does not exist.".to_string(),
            invalid_credentials: "The username and password combination is incorrect.".to_string(),
            store_unavailable: "Login is temporarily unavailable, please try again.".to_string(),
            logged_in: "Successfully logged in".to_string(),
            logged_out: "Successfully logged out".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SERVER_ADDR.to_string(),
            server_port: SERVER_PORT,
            database_path: PathBuf::from(paths::auth_db_path()),
            session: SessionConfig {
                duration_hours: SESSION_DURATION_HOURS,
                secret: None,
            },
            auth: AuthConfig::default(),
            messages: Messages::default(),
        }
    }
}

impl Config {
    /// Load from `config.toml` in the working directory, the environment and defaults
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();
        Self::load_from(Path::new(paths::CONFIG_FILE))
    }

    /// Load with an explicit config file path. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let file = match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!("Using config file {}", path.display());
                toml::from_str::<FileConfig>(&contents)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        Self::resolve(file)
    }

    fn resolve(file: FileConfig) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let server = file.server.unwrap_or_default();
        let database = file.database.unwrap_or_default();
        let session = file.session.unwrap_or_default();

        let server_port = match server.port {
            Some(port) => port,
            None => match std::env::var("PORT") {
                Ok(value) => value.parse().map_err(|_| ConfigError::Env {
                    key: "PORT",
                    value,
                })?,
                Err(_) => defaults.server_port,
            },
        };

        let database_path = database
            .path
            .or_else(|| std::env::var("DATABASE_PATH").ok())
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        tracing::info!("Using database {}", database_path.display());

        Ok(Self {
            server_addr: server
                .addr
                .or_else(|| std::env::var("SERVER_ADDR").ok())
                .unwrap_or(defaults.server_addr),
            server_port,
            database_path,
            session: SessionConfig {
                duration_hours: session
                    .duration_hours
                    .unwrap_or(defaults.session.duration_hours),
                secret: session
                    .secret
                    .or_else(|| std::env::var("SESSION_SECRET").ok()),
            },
            auth: file.auth,
            messages: file.messages,
        })
    }

    /// Get the full server bind address
    pub fn server_bind_addr(&self) -> String {
        format!("{}:{}", self.server_addr, self.server_port)
    }
}
