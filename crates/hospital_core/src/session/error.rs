//! Session error taxonomy.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SessionResult<T> = Result<T, SessionError>;

/// Lifecycle state of a [`Session`](super::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Open,
    Closed,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unopened => "unopened",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

#[derive(Debug)]
pub enum SessionError {
    /// Operation issued before `open()` or after `close()`.
    NotOpen(SessionState),
    /// Lookup of an id that does not exist.
    NotFound(String),
    /// A written document changed in the store since this session read it.
    ///
    /// `expected`/`actual` are revisions; `None` means "no such document".
    ConcurrencyConflict {
        id: String,
        expected: Option<i64>,
        actual: Option<i64>,
    },
    /// Store or connectivity failure.
    Transport(DbError),
    /// Payload of one attachment could not be read.
    AttachmentFetch {
        document_id: String,
        name: String,
        source: Box<dyn Error + Send + Sync>,
    },
    InvalidPage(String),
    InvalidField(String),
    /// Delete requested for an entity this session never loaded.
    Untracked(String),
    /// Store requested for an entity already deleted in this session.
    DeletedInSession(String),
    Serialization(serde_json::Error),
    InvalidData(String),
}

impl SessionError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOpen(state) => write!(f, "session is not open (state: {state})"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::ConcurrencyConflict {
                id,
                expected,
                actual,
            } => write!(
                f,
                "concurrency conflict on `{id}`: expected revision {}, found {}",
                revision_label(*expected),
                revision_label(*actual)
            ),
            Self::Transport(err) => write!(f, "document store failure: {err}"),
            Self::AttachmentFetch {
                document_id,
                name,
                source,
            } => write!(
                f,
                "failed to fetch attachment `{name}` of `{document_id}`: {source}"
            ),
            Self::InvalidPage(message) => write!(f, "invalid page request: {message}"),
            Self::InvalidField(field) => write!(f, "invalid query field `{field}`"),
            Self::Untracked(id) => {
                write!(f, "document `{id}` is not tracked by this session")
            }
            Self::DeletedInSession(id) => {
                write!(f, "document `{id}` was already deleted in this session")
            }
            Self::Serialization(err) => write!(f, "document serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid stored document: {message}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::AttachmentFetch { source, .. } => Some(source.as_ref()),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SessionError {
    fn from(value: DbError) -> Self {
        Self::Transport(value)
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Transport(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

fn revision_label(revision: Option<i64>) -> String {
    revision.map_or_else(|| "none".to_string(), |value| value.to_string())
}
