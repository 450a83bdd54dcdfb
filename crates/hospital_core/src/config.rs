//! Store and logging configuration.
//!
//! # Responsibility
//! - Describe where the document store lives and what it is called.
//! - Resolve configuration from process environment with stable defaults.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - `:memory:` selects a process-local in-memory store.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Environment variable naming the store file (or `:memory:`).
pub const DB_PATH_ENV: &str = "HOSPITAL_DB_PATH";
/// Environment variable naming the logical database.
pub const DB_NAME_ENV: &str = "HOSPITAL_DB_NAME";
/// Environment variable overriding the log level.
pub const LOG_LEVEL_ENV: &str = "HOSPITAL_LOG_LEVEL";

const DEFAULT_DB_FILE_NAME: &str = "hospital.sqlite3";
const DEFAULT_DATABASE: &str = "Hospital";
const MEMORY_LOCATION: &str = ":memory:";

/// Physical location of the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// SQLite database file.
    File(PathBuf),
    /// In-memory database, alive while the store handle lives.
    ///
    /// Sessions share one SQLite cache. Lock contention there surfaces as
    /// `SQLITE_LOCKED_SHAREDCACHE`, which the busy timeout never retries;
    /// connections wait on unlock notification instead, and a detected
    /// deadlock still fails with `Transport`.
    Memory,
}

impl Display for StoreLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => f.write_str(MEMORY_LOCATION),
        }
    }
}

/// Configuration for one document store handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: StoreLocation,
    /// Logical database name, used in diagnostics and memory store naming.
    pub database: String,
}

impl StoreConfig {
    /// File-backed store using the default database name.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
            database: DEFAULT_DATABASE.to_string(),
        }
    }

    /// In-memory store using the default database name.
    pub fn in_memory() -> Self {
        Self {
            location: StoreLocation::Memory,
            database: DEFAULT_DATABASE.to_string(),
        }
    }

    /// Resolves configuration from `HOSPITAL_DB_PATH` / `HOSPITAL_DB_NAME`.
    ///
    /// Unset path falls back to `hospital.sqlite3` in the temp directory.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let location = match non_blank(DB_PATH_ENV) {
            Some(value) if value == MEMORY_LOCATION => StoreLocation::Memory,
            Some(value) => StoreLocation::File(PathBuf::from(value)),
            None => StoreLocation::File(std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
        };
        let database = non_blank(DB_NAME_ENV).unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        Self { location, database }
    }
}

/// Resolves the log level from `HOSPITAL_LOG_LEVEL`, falling back to the
/// build-mode default.
pub fn log_level_from_env() -> String {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| crate::logging::default_log_level().to_string())
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, StoreLocation, DB_NAME_ENV, DB_PATH_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_temp_file_and_hospital_database() {
        let config = StoreConfig::from_lookup(lookup(&[]));
        assert_eq!(
            config.location,
            StoreLocation::File(std::env::temp_dir().join("hospital.sqlite3"))
        );
        assert_eq!(config.database, "Hospital");
    }

    #[test]
    fn memory_marker_selects_in_memory_store() {
        let config = StoreConfig::from_lookup(lookup(&[(DB_PATH_ENV, " :memory: ")]));
        assert_eq!(config.location, StoreLocation::Memory);
    }

    #[test]
    fn blank_values_are_ignored() {
        let config =
            StoreConfig::from_lookup(lookup(&[(DB_PATH_ENV, "/data/ward.db"), (DB_NAME_ENV, "  ")]));
        assert_eq!(
            config.location,
            StoreLocation::File(PathBuf::from("/data/ward.db"))
        );
        assert_eq!(config.database, "Hospital");
    }
}
