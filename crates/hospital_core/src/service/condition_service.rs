//! Condition catalogue use cases.

use super::require;
use super::view_session::ViewSession;
use crate::conflict::{commit_changes, CommitError};
use crate::model::condition::Condition;
use crate::model::patient::Patient;
use crate::session::error::SessionResult;
use crate::session::query::{PageQuery, QueryResult};
use crate::session::SaveOutcome;
use crate::store::DocumentStore;

pub struct ConditionService<'store> {
    view: ViewSession<'store>,
}

impl<'store> ConditionService<'store> {
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

    /// One page of conditions, filtered by description prefix when `term`
    /// has at least two characters.
    pub fn list(
        &mut self,
        offset: u32,
        limit: u32,
        term: Option<&str>,
    ) -> SessionResult<QueryResult<Condition>> {
        let mut page = PageQuery::new(offset, limit);
        if let Some(term) = term {
            page = page.matching(term);
        }
        self.view.session()?.query::<Condition>(&page)
    }

    pub fn get(&mut self, id: &str) -> SessionResult<Condition> {
        require::<Condition>(self.view.session()?, id)
    }

    /// Patient opened from a condition's detail pane.
    pub fn patient(&mut self, id: &str) -> SessionResult<Patient> {
        require::<Patient>(self.view.session()?, id)
    }

    pub fn save(&mut self, condition: &mut Condition) -> Result<SaveOutcome, CommitError> {
        let session = self.view.session()?;
        session.store(condition)?;
        Ok(commit_changes(session)?)
    }

    pub fn delete(&mut self, condition: &Condition) -> Result<SaveOutcome, CommitError> {
        let session = self.view.session()?;
        session.delete(condition)?;
        Ok(commit_changes(session)?)
    }
}

#[cfg(test)]
mod tests {
    use super::ConditionService;
    use crate::config::StoreConfig;
    use crate::model::condition::Condition;
    use crate::session::error::SessionError;
    use crate::store::DocumentStore;

    fn condition(name: &str, description: &str) -> Condition {
        let mut condition = Condition::new(name);
        condition.description = Some(description.to_string());
        condition
    }

    #[test]
    fn term_filters_by_description_prefix() {
        let store = DocumentStore::open(StoreConfig::in_memory()).unwrap();
        let mut service = ConditionService::new(&store);
        service.attach().unwrap();
        service.save(&mut condition("Flu", "Viral infection")).unwrap();
        service.save(&mut condition("Cold", "viral, mild")).unwrap();
        service.save(&mut condition("Fracture", "Broken bone")).unwrap();

        let filtered = service.list(0, 10, Some("vir")).unwrap();
        assert_eq!(filtered.total, 2);
        assert_eq!(service.list(0, 10, Some("v")).unwrap().total, 3);
        assert_eq!(service.list(0, 10, None).unwrap().total, 3);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let store = DocumentStore::open(StoreConfig::in_memory()).unwrap();
        let mut service = ConditionService::new(&store);
        service.attach().unwrap();
        assert!(matches!(
            service.get("conditions/missing"),
            Err(SessionError::NotFound(id)) if id == "conditions/missing"
        ));
        assert!(matches!(
            service.patient("patients/missing"),
            Err(SessionError::NotFound(_))
        ));
    }
}
