//! Catalog location and runtime configuration.
//!
//! # Responsibility
//! - Resolve where the database, photos and logs live under one data root.
//! - Read overrides from the process environment.
//!
//! # Invariants
//! - `data_dir` is absolute once resolved; stored photo paths derive from it.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the data root.
pub const DATA_DIR_ENV: &str = "CLOSET_DATA_DIR";
/// Environment variable overriding the log level.
pub const LOG_LEVEL_ENV: &str = "CLOSET_LOG_LEVEL";

const DEFAULT_DB_FILE_NAME: &str = "closet.sqlite3";
const DEFAULT_PHOTOS_DIR_NAME: &str = "photos";
const LOGS_DIR_NAME: &str = "logs";
const DEFAULT_DATA_DIR_NAME: &str = "mirandas_closet";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub data_dir: PathBuf,
    pub db_file_name: String,
    pub photos_dir_name: String,
    pub log_level: String,
}

impl CatalogConfig {
    /// Builds a config rooted at `data_dir` with default file names.
    ///
    /// Relative roots are resolved against the current directory.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        let data_dir = if data_dir.is_absolute() {
            data_dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(data_dir))
                .unwrap_or_else(|_| data_dir.to_path_buf())
        };

        Self {
            data_dir,
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            photos_dir_name: DEFAULT_PHOTOS_DIR_NAME.to_string(),
            log_level: default_log_level().to_string(),
        }
    }

    /// Builds a config from `CLOSET_DATA_DIR` / `CLOSET_LOG_LEVEL`.
    ///
    /// Falls back to a directory under the system temp dir when unset.
    pub fn from_env() -> Self {
        let data_dir = non_blank_env(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DATA_DIR_NAME));
        let mut config = Self::new(data_dir);
        if let Some(level) = non_blank_env(LOG_LEVEL_ENV) {
            config.log_level = level;
        }
        config
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file_name)
    }

    pub fn photos_dir(&self) -> PathBuf {
        self.data_dir.join(&self.photos_dir_name)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join(LOGS_DIR_NAME)
    }

    /// Creates the data root when missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.photos_dir())
    }
}

fn non_blank_env(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
