//! Store configuration resolved from the process environment.
//!
//! # Responsibility
//! - Decide where the database file lives and how logging is set up.
//! - Keep environment lookups in one place so callers can inject values.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - `STUDYOS_DB_PATH` wins over `STUDYOS_DATA_DIR`.

use crate::logging::default_log_level;
use std::path::PathBuf;

/// Database file name used inside the data directory.
pub const DB_FILE_NAME: &str = "student_productivity_os.sqlite3";
/// Data directory name used under the system temp dir when nothing is set.
pub const DEFAULT_DATA_DIR_NAME: &str = "student_productivity_os";

pub const ENV_DB_PATH: &str = "STUDYOS_DB_PATH";
pub const ENV_DATA_DIR: &str = "STUDYOS_DATA_DIR";
pub const ENV_LOG_LEVEL: &str = "STUDYOS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "STUDYOS_LOG_DIR";

/// Resolved settings for one store instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file path. Parent directories are created on first open.
    pub db_path: PathBuf,
    /// Log level passed to `init_logging`.
    pub log_level: String,
    /// Rolling log directory. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolves configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let db_path = match (read(ENV_DB_PATH), read(ENV_DATA_DIR)) {
            (Some(path), _) => PathBuf::from(path),
            (None, Some(dir)) => PathBuf::from(dir).join(DB_FILE_NAME),
            (None, None) => default_data_dir().join(DB_FILE_NAME),
        };

        Self {
            db_path,
            log_level: read(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
        }
    }

    /// Returns a copy pointing at another database file.
    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

fn default_data_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DATA_DIR_NAME)
}
