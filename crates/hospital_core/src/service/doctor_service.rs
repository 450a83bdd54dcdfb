//! Doctor roster use cases.

use super::configuration;
use super::view_session::ViewSession;
use crate::conflict::{commit_changes, CommitError};
use crate::model::doctor::Doctor;
use crate::model::document::Document;
use crate::model::patient::Patient;
use crate::model::views::DoctorVisit;
use crate::session::error::SessionResult;
use crate::session::grouped::{GroupQuery, COUNT_ALIAS};
use crate::session::query::{OrderBy, PageQuery, QueryResult};
use crate::session::SaveOutcome;
use crate::store::DocumentStore;

/// Visits grouped by visiting doctor id, busiest first.
///
/// Visits without a doctor id are not counted. Names recorded on visits are
/// ignored; [`DoctorService::doctor_visits`] resolves them from the roster.
pub fn doctor_visits_query() -> GroupQuery {
    GroupQuery::over(Patient::COLLECTION)
        .unwind("visits")
        .item_key("doctorId", "doctorId")
        .require("doctorId")
}

pub struct DoctorService<'store> {
    view: ViewSession<'store>,
}

impl<'store> DoctorService<'store> {
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

    /// One page of doctors ordered by name.
    pub fn list(&mut self, offset: u32, limit: u32) -> SessionResult<QueryResult<Doctor>> {
        let page = PageQuery::new(offset, limit)
            .with_order(Doctor::ORDER_FIELD.map(OrderBy::ascending));
        self.view.session()?.query::<Doctor>(&page)
    }

    /// Creates or updates a doctor; assigns `doctor.id` when new.
    pub fn save(&mut self, doctor: &mut Doctor) -> Result<SaveOutcome, CommitError> {
        let session = self.view.session()?;
        session.store(doctor)?;
        Ok(commit_changes(session)?)
    }

    pub fn delete(&mut self, doctor: &Doctor) -> Result<SaveOutcome, CommitError> {
        let session = self.view.session()?;
        session.delete(doctor)?;
        Ok(commit_changes(session)?)
    }

    /// Department choices for the doctor form; empty when unconfigured.
    pub fn departments(&mut self) -> SessionResult<Vec<String>> {
        let session = self.view.session()?;
        Ok(configuration(session)?
            .map(|config| config.departments)
            .unwrap_or_default())
    }

    /// Visit counts per doctor. `doctor_name` comes from the doctor document
    /// and stays `None` when the id has no roster entry.
    pub fn doctor_visits(
        &mut self,
        offset: u32,
        limit: u32,
    ) -> SessionResult<QueryResult<DoctorVisit>> {
        let page = PageQuery::new(offset, limit).ordered_by(OrderBy::descending(COUNT_ALIAS));
        let session = self.view.session()?;
        let mut result = session.query_grouped::<DoctorVisit>(&doctor_visits_query(), &page)?;
        for row in &mut result.rows {
            row.doctor_name = session
                .load::<Doctor>(&row.doctor_id)?
                .map(|doctor| doctor.name);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::DoctorService;
    use crate::config::StoreConfig;
    use crate::model::doctor::Doctor;
    use crate::store::DocumentStore;

    #[test]
    fn list_is_ordered_by_name_and_counts_all() {
        let store = DocumentStore::open(StoreConfig::in_memory()).unwrap();
        let mut service = DoctorService::new(&store);
        service.attach().unwrap();
        for name in ["Quinn", "Bailey", "Shepherd"] {
            service.save(&mut Doctor::new(name)).unwrap();
        }

        let page = service.list(0, 2).unwrap();
        assert_eq!(page.total, 3);
        let names = page.rows.iter().map(|d| d.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Bailey", "Quinn"]);
    }

    #[test]
    fn delete_requires_a_doctor_read_by_this_view() {
        let store = DocumentStore::open(StoreConfig::in_memory()).unwrap();
        let mut service = DoctorService::new(&store);
        service.attach().unwrap();
        let mut doctor = Doctor::new("Webber");
        service.save(&mut doctor).unwrap();

        service.delete(&doctor).unwrap();
        assert_eq!(service.list(0, 10).unwrap().total, 0);
    }
}
