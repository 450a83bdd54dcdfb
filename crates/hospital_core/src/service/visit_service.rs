//! Visit history use cases.
//!
//! # Invariants
//! - Visit history only shows visits with a date; undated visits are kept on
//!   the patient but never listed.
//! - `order == true` lists newest first.

use super::view_session::ViewSession;
use super::{configuration, lookup_all, require};
use crate::conflict::{commit_changes, CommitError};
use crate::model::condition::Condition;
use crate::model::doctor::Doctor;
use crate::model::document::Document;
use crate::model::patient::{Patient, Visit};
use crate::model::views::PatientVisit;
use crate::session::error::SessionResult;
use crate::session::fields::normalize_search_term;
use crate::session::grouped::GroupQuery;
use crate::session::query::{OrderBy, PageQuery, QueryResult};
use crate::store::DocumentStore;

/// Visit history grid: one row per (doctor, date, summary, patient).
pub fn visit_history_query() -> GroupQuery {
    GroupQuery::over(Patient::COLLECTION)
        .unwind("visits")
        .item_key("doctorName", "doctorName")
        .item_key("date", "date")
        .item_key("visitSummary", "visitSummary")
        .key("firstName", "firstName")
        .key("lastName", "lastName")
        .require("date")
        .searching("doctorName")
}

pub struct VisitService<'store> {
    view: ViewSession<'store>,
}

impl<'store> VisitService<'store> {
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

    pub fn list(
        &mut self,
        offset: u32,
        limit: u32,
        order: bool,
    ) -> SessionResult<QueryResult<PatientVisit>> {
        self.history(history_page(offset, limit, order))
    }

    /// Visit history filtered by doctor-name prefix.
    pub fn search(
        &mut self,
        offset: u32,
        limit: u32,
        term: &str,
        order: bool,
    ) -> SessionResult<QueryResult<PatientVisit>> {
        self.history(history_page(offset, limit, order).matching(term))
    }

    /// Dated visits of one patient, optionally filtered by doctor-name prefix.
    pub fn patient_visits(
        &mut self,
        patient_id: &str,
        term: Option<&str>,
        order: bool,
    ) -> SessionResult<Vec<Visit>> {
        let patient = require::<Patient>(self.view.session()?, patient_id)?;
        let prefix = term
            .and_then(normalize_search_term)
            .map(|term| term.to_lowercase());

        let mut visits = patient
            .visits
            .into_iter()
            .filter(|visit| visit.date.is_some())
            .filter(|visit| match &prefix {
                Some(prefix) => visit
                    .doctor_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().starts_with(prefix.as_str())),
                None => true,
            })
            .collect::<Vec<_>>();
        visits.sort_by(|left, right| {
            let ordering = left.date.cmp(&right.date);
            if order {
                ordering.reverse()
            } else {
                ordering
            }
        });
        Ok(visits)
    }

    /// Appends `visit` to the patient's history and saves the patient.
    pub fn add_visit(&mut self, patient_id: &str, visit: Visit) -> Result<Patient, CommitError> {
        let session = self.view.session()?;
        let mut patient = require::<Patient>(session, patient_id)?;
        patient.visits.push(visit);
        session.store(&mut patient)?;
        commit_changes(session)?;
        Ok(patient)
    }

    pub fn patient(&mut self, id: &str) -> SessionResult<Patient> {
        require::<Patient>(self.view.session()?, id)
    }

    /// Doctor choices for the visit form.
    pub fn doctors(&mut self) -> SessionResult<Vec<Doctor>> {
        lookup_all::<Doctor>(self.view.session()?)
    }

    /// Condition choices for the visit form.
    pub fn conditions(&mut self) -> SessionResult<Vec<Condition>> {
        lookup_all::<Condition>(self.view.session()?)
    }

    /// Location choices for the visit form; empty when unconfigured.
    pub fn locations(&mut self) -> SessionResult<Vec<String>> {
        Ok(configuration(self.view.session()?)?
            .map(|config| config.locations)
            .unwrap_or_default())
    }

    fn history(&mut self, page: PageQuery) -> SessionResult<QueryResult<PatientVisit>> {
        self.view
            .session()?
            .query_grouped::<PatientVisit>(&visit_history_query(), &page)
    }
}

fn history_page(offset: u32, limit: u32, order: bool) -> PageQuery {
    let order = if order {
        OrderBy::descending("date")
    } else {
        OrderBy::ascending("date")
    };
    PageQuery::new(offset, limit).ordered_by(order)
}
