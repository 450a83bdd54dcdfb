//! Commit wrapper that separates write conflicts from other failures.
//!
//! # Responsibility
//! - Run `save_changes` on behalf of views.
//! - Turn a concurrency conflict into a user-facing notice and reset the
//!   session so the caller reloads before retrying.
//!
//! # Invariants
//! - No automatic merge or retry.
//! - Non-conflict failures pass through unchanged and keep pending work.

use crate::session::error::SessionError;
use crate::session::{SaveOutcome, Session};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Message shown to the user when their edit lost a race.
pub const CONFLICT_MESSAGE: &str = "this record was changed by someone else";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictNotice {
    pub document_id: String,
    pub message: String,
}

impl ConflictNotice {
    fn for_document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            message: CONFLICT_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum CommitError {
    /// Another session committed first; reload and retry.
    Conflict(ConflictNotice),
    Failed(SessionError),
}

impl CommitError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl Display for CommitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict(notice) => write!(f, "{} ({})", notice.message, notice.document_id),
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CommitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Conflict(_) => None,
            Self::Failed(err) => Some(err),
        }
    }
}

impl From<SessionError> for CommitError {
    fn from(value: SessionError) -> Self {
        Self::Failed(value)
    }
}

/// Saves pending changes, classifying a conflict as [`CommitError::Conflict`].
///
/// On conflict the session's pending changes are discarded and the stale
/// revision forgotten.
pub fn commit_changes(session: &mut Session<'_>) -> Result<SaveOutcome, CommitError> {
    match session.save_changes() {
        Ok(outcome) => Ok(outcome),
        Err(SessionError::ConcurrencyConflict {
            id,
            expected,
            actual,
        }) => {
            let discarded = session.discard_changes();
            session.forget(&id);
            warn!(
                "event=commit_conflict module=conflict status=rejected session_id={} id={} expected={:?} actual={:?} discarded={}",
                session.id(),
                id,
                expected,
                actual,
                discarded
            );
            Err(CommitError::Conflict(ConflictNotice::for_document(id)))
        }
        Err(err) => Err(CommitError::Failed(err)),
    }
}
