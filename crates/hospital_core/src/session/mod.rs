//! Unit-of-work sessions over the document store.
//!
//! # Responsibility
//! - Bind one connection to one edit session (`Unopened → Open → Closed`).
//! - Track revisions of every document read, buffer writes until
//!   [`Session::save_changes`], and enforce optimistic concurrency there.
//!
//! # Invariants
//! - Optimistic concurrency is always on; there is no opt-out.
//! - Nothing touches the store between `store`/`delete` and `save_changes`.
//! - A failed save commits nothing and keeps pending work; a successful save
//!   clears it and refreshes tracked revisions.
//! - The first revision read for an id stays tracked. Re-reads never refresh
//!   it; only a successful save or [`Session::forget`] followed by a read does.
//! - A closed session never reopens.

pub mod error;
pub mod fields;
pub mod grouped;
pub mod query;

use crate::attachment::{Attachment, AttachmentName, AttachmentSource};
use crate::model::document::{new_document_id, Document};
use crate::store::DocumentStore;
use error::{SessionError, SessionResult, SessionState};
use grouped::{run_grouped, GroupQuery};
use log::{debug, info, warn};
use query::{run_page, PageQuery, QueryResult};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum PendingWrite {
    Store {
        collection: &'static str,
        body: serde_json::Value,
    },
    Delete,
}

#[derive(Debug, Clone)]
enum AttachmentOp {
    Put {
        document_id: String,
        attachment: Attachment,
    },
    Remove {
        document_id: String,
        name: String,
    },
}

impl AttachmentOp {
    fn document_id(&self) -> &str {
        match self {
            Self::Put { document_id, .. } | Self::Remove { document_id, .. } => document_id,
        }
    }
}

/// Counts of what one successful `save_changes` committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    pub stored: usize,
    pub deleted: usize,
    pub attachments: usize,
}

impl SaveOutcome {
    pub fn is_empty(&self) -> bool {
        self.stored == 0 && self.deleted == 0 && self.attachments == 0
    }
}

/// One unit of work. Owned by exactly one caller at a time.
pub struct Session<'store> {
    id: Uuid,
    store: &'store DocumentStore,
    state: SessionState,
    conn: Option<Connection>,
    tracked: HashMap<String, i64>,
    pending: BTreeMap<String, PendingWrite>,
    attachment_ops: Vec<AttachmentOp>,
}

impl<'store> Session<'store> {
    /// Creates an unopened session; no connection is taken yet.
    pub fn new(store: &'store DocumentStore) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
            state: SessionState::Unopened,
            conn: None,
            tracked: HashMap::new(),
            pending: BTreeMap::new(),
            attachment_ops: Vec::new(),
        }
    }

    /// Stable id for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Opens the unit of work. A no-op when already open.
    ///
    /// # Errors
    /// - `NotOpen(Closed)` after `close()`.
    /// - `Transport` when no connection can be acquired.
    pub fn open(&mut self) -> SessionResult<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(SessionError::NotOpen(SessionState::Closed)),
            SessionState::Unopened => {
                let conn = self.store.connect()?;
                self.conn = Some(conn);
                self.state = SessionState::Open;
                info!(
                    "event=session_open module=session status=ok session_id={} optimistic_concurrency=on",
                    self.id
                );
                Ok(())
            }
        }
    }

    /// Releases the connection and drops pending work without committing.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let discarded = self.pending.len() + self.attachment_ops.len();
        self.conn = None;
        self.tracked.clear();
        self.pending.clear();
        self.attachment_ops.clear();
        self.state = SessionState::Closed;
        info!(
            "event=session_close module=session status=ok session_id={} discarded={}",
            self.id, discarded
        );
    }

    /// Runs a paginated query against `T`'s collection and tracks every row
    /// not tracked yet.
    pub fn query<T: Document>(&mut self, page: &PageQuery) -> SessionResult<QueryResult<T>> {
        let started_at = Instant::now();
        let result = run_page(self.conn()?, T::COLLECTION, T::SEARCH_FIELDS, page)?;

        let mut rows = Vec::with_capacity(result.rows.len());
        for stored in result.rows {
            let entity = decode::<T>(&stored.id, &stored.body)?;
            self.track(stored.id, stored.revision);
            rows.push(entity);
        }

        debug!(
            "event=session_query module=session status=ok session_id={} collection={} offset={} limit={} rows={} total={} duration_ms={}",
            self.id,
            T::COLLECTION,
            page.offset,
            page.limit,
            rows.len(),
            result.total,
            started_at.elapsed().as_millis()
        );
        Ok(QueryResult {
            rows,
            total: result.total,
        })
    }

    /// Runs a grouped query. Group rows are projections and are not tracked.
    pub fn query_grouped<R: DeserializeOwned>(
        &self,
        group: &GroupQuery,
        page: &PageQuery,
    ) -> SessionResult<QueryResult<R>> {
        let result = run_grouped(self.conn()?, group, page)?;
        debug!(
            "event=session_query_grouped module=session status=ok session_id={} collection={} rows={} total={}",
            self.id,
            group.collection,
            result.rows.len(),
            result.total
        );
        Ok(result)
    }

    /// Loads one document by id; `Ok(None)` when it does not exist.
    ///
    /// Pending work in this session wins: a pending store returns its snapshot
    /// and a pending delete returns `None`. Otherwise the store is read; an id
    /// already tracked keeps the revision it was first read at, so a stale
    /// edit still conflicts at save. Call [`Session::forget`] first to rebase.
    pub fn load<T: Document>(&mut self, id: &str) -> SessionResult<Option<T>> {
        let conn = self.conn()?;
        match self.pending.get(id) {
            Some(PendingWrite::Delete) => return Ok(None),
            Some(PendingWrite::Store { collection, body }) if *collection == T::COLLECTION => {
                let mut entity: T = serde_json::from_value(body.clone())?;
                entity.set_id(id.to_string());
                return Ok(Some(entity));
            }
            _ => {}
        }

        let row = conn
            .query_row(
                "SELECT collection, body, revision FROM documents WHERE id = ?1;",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((collection, body, revision)) = row else {
            return Ok(None);
        };
        if collection != T::COLLECTION {
            debug!(
                "event=session_load module=session status=type_mismatch session_id={} id={} collection={} expected={}",
                self.id,
                id,
                collection,
                T::COLLECTION
            );
            return Ok(None);
        }

        let entity = decode::<T>(id, &body)?;
        self.track(id.to_string(), revision);
        Ok(Some(entity))
    }

    /// Marks `entity` for upsert, assigning a store key when it has none.
    ///
    /// The entity is snapshotted now; later mutations need another `store`.
    pub fn store<T: Document>(&mut self, entity: &mut T) -> SessionResult<()> {
        self.conn()?;
        let id = match entity.id() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => {
                let id = new_document_id(T::COLLECTION);
                entity.set_id(id.clone());
                id
            }
        };

        if matches!(self.pending.get(&id), Some(PendingWrite::Delete)) {
            return Err(SessionError::DeletedInSession(id));
        }

        let body = serde_json::to_value(&*entity)?;
        debug!(
            "event=session_store module=session status=pending session_id={} id={}",
            self.id, id
        );
        self.pending.insert(
            id,
            PendingWrite::Store {
                collection: T::COLLECTION,
                body,
            },
        );
        Ok(())
    }

    /// Marks `entity` for removal. Attachments go with it.
    ///
    /// An entity stored but never saved is simply dropped from pending work.
    pub fn delete<T: Document>(&mut self, entity: &T) -> SessionResult<()> {
        self.conn()?;
        let Some(id) = entity.id().map(str::to_string) else {
            return Err(SessionError::Untracked(format!("unsaved {}", T::COLLECTION)));
        };

        self.attachment_ops.retain(|op| op.document_id() != id);
        if self.tracked.contains_key(&id) {
            self.pending.insert(id, PendingWrite::Delete);
            return Ok(());
        }
        if self.pending.remove(&id).is_some() {
            return Ok(());
        }
        Err(SessionError::Untracked(id))
    }

    /// Queues `attachment` to be stored on `document_id` (replacing by name).
    pub fn store_attachment(
        &mut self,
        document_id: &str,
        attachment: Attachment,
    ) -> SessionResult<()> {
        self.ensure_writable(document_id)?;
        self.attachment_ops.push(AttachmentOp::Put {
            document_id: document_id.to_string(),
            attachment,
        });
        Ok(())
    }

    /// Queues removal of attachment `name` from `document_id`.
    pub fn delete_attachment(&mut self, document_id: &str, name: &str) -> SessionResult<()> {
        self.ensure_writable(document_id)?;
        self.attachment_ops.push(AttachmentOp::Remove {
            document_id: document_id.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    /// Committed attachments of `document_id`, in storage order.
    pub fn attachment_names(&self, document_id: &str) -> SessionResult<Vec<AttachmentName>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, content_type, length(data) AS size
             FROM attachments
             WHERE document_id = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([document_id])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(AttachmentName {
                name: row.get("name")?,
                content_type: row.get("content_type")?,
                size: u64::try_from(row.get::<_, i64>("size")?).unwrap_or_default(),
            });
        }
        Ok(names)
    }

    /// Reads one committed attachment payload.
    pub fn get_attachment(
        &self,
        document_id: &str,
        name: &str,
    ) -> SessionResult<Option<Attachment>> {
        let conn = self.conn()?;
        let attachment = conn
            .query_row(
                "SELECT name, content_type, data
                 FROM attachments
                 WHERE document_id = ?1 AND name = ?2;",
                params![document_id, name],
                |row| {
                    Ok(Attachment {
                        name: row.get(0)?,
                        content_type: row.get(1)?,
                        bytes: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(attachment)
    }

    /// Whether any write is waiting for `save_changes`.
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty() || !self.attachment_ops.is_empty()
    }

    /// Drops all pending work; returns how many operations were dropped.
    pub fn discard_changes(&mut self) -> usize {
        let discarded = self.pending.len() + self.attachment_ops.len();
        self.pending.clear();
        self.attachment_ops.clear();
        discarded
    }

    /// Stops tracking `id`; it must be loaded again before it can be written.
    pub fn forget(&mut self, id: &str) {
        self.tracked.remove(id);
    }

    /// Commits all pending writes as one batch.
    ///
    /// # Errors
    /// - `ConcurrencyConflict` when a written document's revision differs from
    ///   the one this session read (or a new id already exists).
    /// - `NotFound` when an attachment targets a document that no longer exists.
    /// - `Transport` on store failure.
    pub fn save_changes(&mut self) -> SessionResult<SaveOutcome> {
        let started_at = Instant::now();
        let conn = match (self.state, self.conn.as_mut()) {
            (SessionState::Open, Some(conn)) => conn,
            (state, _) => return Err(SessionError::NotOpen(state)),
        };
        if self.pending.is_empty() && self.attachment_ops.is_empty() {
            return Ok(SaveOutcome::default());
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let applied = apply_batch(&tx, &self.pending, &self.attachment_ops, &self.tracked)
            .and_then(|applied| {
                tx.commit()?;
                Ok(applied)
            });

        match applied {
            Ok((outcome, revisions)) => {
                for (id, revision) in revisions {
                    match revision {
                        Some(revision) => self.tracked.insert(id, revision),
                        None => self.tracked.remove(&id),
                    };
                }
                self.pending.clear();
                self.attachment_ops.clear();
                info!(
                    "event=session_save module=session status=ok session_id={} stored={} deleted={} attachments={} duration_ms={}",
                    self.id,
                    outcome.stored,
                    outcome.deleted,
                    outcome.attachments,
                    started_at.elapsed().as_millis()
                );
                Ok(outcome)
            }
            Err(err) => {
                let status = match &err {
                    SessionError::ConcurrencyConflict { .. } => "conflict",
                    SessionError::Transport(db) if db.is_busy() => "busy",
                    _ => "error",
                };
                warn!(
                    "event=session_save module=session status={} session_id={} duration_ms={} error={}",
                    status,
                    self.id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn conn(&self) -> SessionResult<&Connection> {
        match (self.state, self.conn.as_ref()) {
            (SessionState::Open, Some(conn)) => Ok(conn),
            (state, _) => Err(SessionError::NotOpen(state)),
        }
    }

    fn track(&mut self, id: String, revision: i64) {
        // A pending write keeps the revision it was based on.
        if !self.pending.contains_key(&id) {
            self.tracked.entry(id).or_insert(revision);
        }
    }

    fn ensure_writable(&self, document_id: &str) -> SessionResult<()> {
        self.conn()?;
        match self.pending.get(document_id) {
            Some(PendingWrite::Delete) => Err(SessionError::DeletedInSession(
                document_id.to_string(),
            )),
            Some(PendingWrite::Store { .. }) => Ok(()),
            None if self.tracked.contains_key(document_id) => Ok(()),
            None => Err(SessionError::Untracked(document_id.to_string())),
        }
    }
}

impl AttachmentSource for Session<'_> {
    fn attachment_names(&self, document_id: &str) -> SessionResult<Vec<AttachmentName>> {
        Session::attachment_names(self, document_id)
    }

    fn fetch_attachment(
        &self,
        document_id: &str,
        name: &AttachmentName,
    ) -> SessionResult<Attachment> {
        self.get_attachment(document_id, &name.name)?
            .ok_or_else(|| SessionError::AttachmentFetch {
                document_id: document_id.to_string(),
                name: name.name.clone(),
                source: "attachment removed while listing".into(),
            })
    }
}

type RevisionUpdates = Vec<(String, Option<i64>)>;

fn apply_batch(
    tx: &Transaction<'_>,
    pending: &BTreeMap<String, PendingWrite>,
    attachment_ops: &[AttachmentOp],
    tracked: &HashMap<String, i64>,
) -> SessionResult<(SaveOutcome, RevisionUpdates)> {
    let mut outcome = SaveOutcome::default();
    let mut revisions: BTreeMap<String, Option<i64>> = BTreeMap::new();

    for (id, write) in pending {
        let current = current_revision(tx, id)?;
        let expected = tracked.get(id).copied();
        if current != expected {
            return Err(SessionError::ConcurrencyConflict {
                id: id.clone(),
                expected,
                actual: current,
            });
        }

        match write {
            PendingWrite::Store { collection, body } => {
                let body_text = serde_json::to_string(body)?;
                let next = match current {
                    Some(revision) => {
                        tx.execute(
                            "UPDATE documents
                             SET
                                body = ?2,
                                revision = ?3,
                                updated_at = (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
                             WHERE id = ?1;",
                            params![id, body_text, revision + 1],
                        )?;
                        revision + 1
                    }
                    None => {
                        tx.execute(
                            "INSERT INTO documents (id, collection, body, revision)
                             VALUES (?1, ?2, ?3, 1);",
                            params![id, collection, body_text],
                        )?;
                        1
                    }
                };
                revisions.insert(id.clone(), Some(next));
                outcome.stored += 1;
            }
            PendingWrite::Delete => {
                tx.execute("DELETE FROM documents WHERE id = ?1;", [id])?;
                revisions.insert(id.clone(), None);
                outcome.deleted += 1;
            }
        }
    }

    for op in attachment_ops {
        let document_id = op.document_id();
        match revisions.get(document_id) {
            Some(Some(_)) => {}
            Some(None) => return Err(SessionError::NotFound(document_id.to_string())),
            None => {
                // Attachment-only change: check and bump the owner's revision once.
                let current = current_revision(tx, document_id)?
                    .ok_or_else(|| SessionError::NotFound(document_id.to_string()))?;
                let expected = tracked.get(document_id).copied();
                if expected != Some(current) {
                    return Err(SessionError::ConcurrencyConflict {
                        id: document_id.to_string(),
                        expected,
                        actual: Some(current),
                    });
                }
                tx.execute(
                    "UPDATE documents
                     SET
                        revision = ?2,
                        updated_at = (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
                     WHERE id = ?1;",
                    params![document_id, current + 1],
                )?;
                revisions.insert(document_id.to_string(), Some(current + 1));
            }
        }

        match op {
            AttachmentOp::Put {
                document_id,
                attachment,
            } => {
                tx.execute(
                    "INSERT INTO attachments (document_id, name, content_type, data, position)
                     VALUES (
                        ?1, ?2, ?3, ?4,
                        (SELECT COALESCE(MAX(position), 0) + 1 FROM attachments WHERE document_id = ?1)
                     )
                     ON CONFLICT (document_id, name) DO UPDATE SET
                        content_type = excluded.content_type,
                        data = excluded.data;",
                    params![
                        document_id,
                        attachment.name,
                        attachment.content_type,
                        attachment.bytes
                    ],
                )?;
            }
            AttachmentOp::Remove { document_id, name } => {
                tx.execute(
                    "DELETE FROM attachments WHERE document_id = ?1 AND name = ?2;",
                    params![document_id, name],
                )?;
            }
        }
        outcome.attachments += 1;
    }

    Ok((outcome, revisions.into_iter().collect()))
}

fn current_revision(tx: &Transaction<'_>, id: &str) -> SessionResult<Option<i64>> {
    let revision = tx
        .query_row(
            "SELECT revision FROM documents WHERE id = ?1;",
            [id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(revision)
}

fn decode<T: Document>(id: &str, body: &str) -> SessionResult<T> {
    let mut entity: T = serde_json::from_str(body)
        .map_err(|err| SessionError::InvalidData(format!("document `{id}`: {err}")))?;
    entity.set_id(id.to_string());
    Ok(entity)
}
