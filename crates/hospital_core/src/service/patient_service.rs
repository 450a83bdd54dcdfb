//! Patient list and edit use cases.
//!
//! # Invariants
//! - List rows carry at most the primary picture; a picture that fails to
//!   load leaves the row without one.
//! - `update` replaces the primary picture instead of accumulating pictures.

use super::view_session::ViewSession;
use super::{configuration, require};
use crate::attachment::{merge_primary_attachments, PatientWithPicture, PRIMARY_ATTACHMENT};
use crate::conflict::{commit_changes, CommitError};
use crate::model::document::Document;
use crate::model::patient::{Address, Patient};
use crate::session::error::{SessionError, SessionResult};
use crate::session::query::{OrderBy, PageQuery, QueryResult};
use crate::session::{SaveOutcome, Session};
use crate::store::DocumentStore;
use log::info;

pub struct PatientService<'store> {
    view: ViewSession<'store>,
}

impl<'store> PatientService<'store> {
    pub fn new(store: &'store DocumentStore) -> Self {
        Self {
            view: ViewSession::new(store),
        }
    }

    pub fn attach(&mut self) -> SessionResult<()> {
        self.view.open().map(|_| ())
    }

    pub fn detach(&mut self) {
        self.view.release();
    }

    /// One page of patients; ordered by birth date when `order` is set.
    pub fn list(
        &mut self,
        offset: u32,
        limit: u32,
        order: bool,
    ) -> SessionResult<QueryResult<PatientWithPicture>> {
        self.page(patient_page(offset, limit, order))
    }

    /// Like [`list`](Self::list), filtered by first-name prefix.
    pub fn search(
        &mut self,
        offset: u32,
        limit: u32,
        term: &str,
        order: bool,
    ) -> SessionResult<QueryResult<PatientWithPicture>> {
        self.page(patient_page(offset, limit, order).matching(term))
    }

    /// One patient with its primary picture; `NotFound` when missing.
    pub fn get(&mut self, id: &str) -> SessionResult<PatientWithPicture> {
        let session = self.view.session()?;
        let patient = require::<Patient>(session, id)?;
        let merged = merge_primary_attachments(
            &*session,
            QueryResult {
                rows: vec![patient],
                total: 1,
            },
        )?;
        merged
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Stores a new patient and its picture; assigns `row.entity.id`.
    pub fn create(&mut self, row: &mut PatientWithPicture) -> Result<SaveOutcome, CommitError> {
        let session = self.view.session()?;
        session.store(&mut row.entity)?;
        if let (Some(id), Some(attachment)) = (row.entity.id(), row.attachment.clone()) {
            session.store_attachment(id, attachment)?;
        }
        let outcome = commit_changes(session)?;
        info!(
            "event=patient_create module=service status=ok with_picture={}",
            row.attachment.is_some()
        );
        Ok(outcome)
    }

    /// Stores edits to a patient read by this view and replaces its picture.
    pub fn update(&mut self, row: &mut PatientWithPicture) -> Result<SaveOutcome, CommitError> {
        let session = self.view.session()?;
        session.store(&mut row.entity)?;
        if let Some(id) = row.entity.id().map(str::to_string) {
            replace_primary_picture(session, &id, row)?;
        }
        Ok(commit_changes(session)?)
    }

    /// Replaces the address of `patient_id`, returning the saved patient.
    pub fn save_address(
        &mut self,
        patient_id: &str,
        address: Address,
    ) -> Result<Patient, CommitError> {
        let session = self.view.session()?;
        let mut patient = require::<Patient>(session, patient_id)?;
        patient.address = Some(address);
        session.store(&mut patient)?;
        commit_changes(session)?;
        Ok(patient)
    }

    /// Deletes the patient and its pictures.
    pub fn delete(&mut self, row: &PatientWithPicture) -> Result<SaveOutcome, CommitError> {
        let session = self.view.session()?;
        session.delete(&row.entity)?;
        Ok(commit_changes(session)?)
    }

    /// Region choices for the address form; empty when unconfigured.
    pub fn regions(&mut self) -> SessionResult<Vec<String>> {
        let session = self.view.session()?;
        Ok(configuration(session)?
            .map(|config| config.regions)
            .unwrap_or_default())
    }

    fn page(&mut self, page: PageQuery) -> SessionResult<QueryResult<PatientWithPicture>> {
        let session = self.view.session()?;
        let result = session.query::<Patient>(&page)?;
        merge_primary_attachments(&*session, result)
    }
}

fn patient_page(offset: u32, limit: u32, order: bool) -> PageQuery {
    let order = Patient::ORDER_FIELD
        .filter(|_| order)
        .map(OrderBy::ascending);
    PageQuery::new(offset, limit).with_order(order)
}

fn replace_primary_picture(
    session: &mut Session<'_>,
    id: &str,
    row: &PatientWithPicture,
) -> SessionResult<()> {
    let names = session.attachment_names(id)?;
    if let Some(primary) = PRIMARY_ATTACHMENT.select(&names) {
        let same_name = row
            .attachment
            .as_ref()
            .is_some_and(|attachment| attachment.name == primary.name);
        // Same name is an in-place replace and keeps the primary slot.
        if !same_name {
            session.delete_attachment(id, &primary.name)?;
        }
    }
    if let Some(attachment) = row.attachment.clone() {
        session.store_attachment(id, attachment)?;
    }
    Ok(())
}
