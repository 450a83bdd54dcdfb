//! Process-wide handle to the document store.
//!
//! # Responsibility
//! - Validate that the configured database is reachable and migrated.
//! - Hand out one fresh connection per session.
//!
//! # Invariants
//! - A handle is never mutated after [`DocumentStore::open`] returns.
//! - In-memory stores stay alive exactly as long as their handle.

use crate::config::{StoreConfig, StoreLocation};
use crate::db::{open_db, open_shared_memory_db, DbError, DbResult};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

pub mod global;

pub use global::{get_store, init_store};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// The global handle already runs with another configuration.
    AlreadyInitialized { active: String, requested: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "document store unavailable: {err}"),
            Self::AlreadyInitialized { active, requested } => write!(
                f,
                "document store already initialized at `{active}`; refusing to switch to `{requested}`"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::AlreadyInitialized { .. } => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Read-only store handle shared by every session.
pub struct DocumentStore {
    config: StoreConfig,
    /// Shared-cache URI name for in-memory stores.
    memory_name: Option<String>,
    // Keeps in-memory databases alive and proves reachability at open time.
    _bootstrap: Mutex<Connection>,
}

impl DocumentStore {
    /// Opens the configured database and applies migrations.
    ///
    /// Every in-memory store is private to its handle, even when two handles
    /// share the same database name.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let memory_name = match config.location {
            StoreLocation::Memory => Some(format!(
                "{}-{}",
                config.database,
                uuid::Uuid::new_v4().simple()
            )),
            StoreLocation::File(_) => None,
        };

        let bootstrap = connect_to(&config, memory_name.as_deref())?;
        info!(
            "event=store_open module=store status=ok database={} location={}",
            config.database, config.location
        );

        Ok(Self {
            config,
            memory_name,
            _bootstrap: Mutex::new(bootstrap),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Opens a new connection for one unit of work.
    pub fn connect(&self) -> DbResult<Connection> {
        connect_to(&self.config, self.memory_name.as_deref())
    }
}

fn connect_to(config: &StoreConfig, memory_name: Option<&str>) -> DbResult<Connection> {
    match (&config.location, memory_name) {
        (StoreLocation::File(path), _) => open_db(path),
        (StoreLocation::Memory, Some(name)) => open_shared_memory_db(name),
        (StoreLocation::Memory, None) => open_shared_memory_db(&config.database),
    }
}
