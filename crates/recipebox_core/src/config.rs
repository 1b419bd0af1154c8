//! Process configuration for hosts embedding the core.
//!
//! # Responsibility
//! - Resolve database location and logging settings from the environment.
//! - Validate values up front so hosts fail before touching storage.
//!
//! # Invariants
//! - A missing `RECIPEBOX_LOG_DIR` disables file logging; it is not an error.
//! - Blank values are treated as errors, not as defaults.

use crate::logging::{default_log_level, init_logging, normalize_level};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Database file path variable.
pub const DB_PATH_ENV: &str = "RECIPEBOX_DB_PATH";
/// Log level variable (`trace|debug|info|warn|error`).
pub const LOG_LEVEL_ENV: &str = "RECIPEBOX_LOG_LEVEL";
/// Absolute log directory variable.
pub const LOG_DIR_ENV: &str = "RECIPEBOX_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "recipebox.sqlite3";

/// Errors raised while resolving configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable is set but blank.
    EmptyValue(&'static str),
    /// Log level is not one of the supported names.
    InvalidLogLevel(String),
    /// Log directory must be absolute.
    RelativeLogDir(PathBuf),
    /// Logger backend rejected the settings.
    Logging(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyValue(key) => write!(f, "{key} is set but blank"),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
            Self::RelativeLogDir(path) => {
                write!(f, "{LOG_DIR_ENV} must be absolute, got `{}`", path.display())
            }
            Self::Logging(message) => write!(f, "logging init failed: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Resolved core settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Normalized log level.
    pub log_level: &'static str,
    /// Rolling log directory. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl CoreConfig {
    /// Reads settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which returns a variable's raw value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = match non_blank(DB_PATH_ENV, lookup(DB_PATH_ENV))? {
            Some(value) => PathBuf::from(value),
            None => PathBuf::from(DEFAULT_DB_FILE_NAME),
        };

        let log_level = match non_blank(LOG_LEVEL_ENV, lookup(LOG_LEVEL_ENV))? {
            Some(value) => normalize_level(&value).map_err(ConfigError::InvalidLogLevel)?,
            None => default_log_level(),
        };

        let log_dir = match non_blank(LOG_DIR_ENV, lookup(LOG_DIR_ENV))? {
            Some(value) => {
                let path = PathBuf::from(value);
                if !path.is_absolute() {
                    return Err(ConfigError::RelativeLogDir(path));
                }
                Some(path)
            }
            None => None,
        };

        Ok(Self {
            db_path,
            log_level,
            log_dir,
        })
    }

    /// Starts file logging when a log directory is configured.
    ///
    /// Returns whether file logging is active.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(false);
        };
        let log_dir = log_dir.to_string_lossy();
        init_logging(self.log_level, &log_dir).map_err(ConfigError::Logging)?;
        info!(
            "event=config_loaded module=config status=ok db_path={} level={}",
            self.db_path.display(),
            self.log_level
        );
        if self.db_path.is_relative() {
            warn!(
                "event=config_loaded module=config status=warn reason=relative_db_path db_path={}",
                self.db_path.display()
            );
        }
        Ok(true)
    }
}

fn non_blank(key: &'static str, value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key)),
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}
