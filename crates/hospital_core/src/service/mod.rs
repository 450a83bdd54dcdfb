//! View-facing services.
//!
//! # Responsibility
//! - Bind one session to each view's attach/detach cycle.
//! - Provide per-entity list/search/create/update/delete use cases plus the
//!   configuration lookups edit forms need.
//!
//! # Invariants
//! - Reads return `SessionResult`; every write goes through
//!   [`commit_changes`](crate::conflict::commit_changes) and returns
//!   `CommitError` so conflicts are explicit.

pub mod condition_service;
pub mod doctor_service;
pub mod patient_service;
pub mod view_session;
pub mod visit_service;

use crate::model::configuration::Configuration;
use crate::model::document::Document;
use crate::session::error::{SessionError, SessionResult};
use crate::session::query::{OrderBy, PageQuery};
use crate::session::Session;

/// Upper bound for unpaged lookup lists (doctor and condition pickers).
pub const LOOKUP_LIMIT: u32 = 500;

/// Loads `id` or fails with `NotFound`.
pub(crate) fn require<T: Document>(session: &mut Session<'_>, id: &str) -> SessionResult<T> {
    session
        .load::<T>(id)?
        .ok_or_else(|| SessionError::NotFound(id.to_string()))
}

/// The first configuration document, if any was seeded.
pub(crate) fn configuration(session: &mut Session<'_>) -> SessionResult<Option<Configuration>> {
    let result = session.query::<Configuration>(&PageQuery::new(0, 1))?;
    Ok(result.rows.into_iter().next())
}

/// Every row of `T` (up to [`LOOKUP_LIMIT`]) in its list order.
pub(crate) fn lookup_all<T: Document>(session: &mut Session<'_>) -> SessionResult<Vec<T>> {
    let page = PageQuery::new(0, LOOKUP_LIMIT).with_order(T::ORDER_FIELD.map(OrderBy::ascending));
    Ok(session.query::<T>(&page)?.rows)
}
