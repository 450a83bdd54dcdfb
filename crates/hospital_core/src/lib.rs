//! Data core for the hospital records application.
//! Sessions, paginated queries and optimistic concurrency over the document store.

pub mod attachment;
pub mod config;
pub mod conflict;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod session;
pub mod store;

pub use attachment::{
    merge_primary_attachments, Attachment, AttachmentName, AttachmentSource, PatientWithPicture,
    PrimaryAttachment, WithAttachment, PRIMARY_ATTACHMENT,
};
pub use config::{StoreConfig, StoreLocation};
pub use conflict::{commit_changes, CommitError, ConflictNotice};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::condition::{Condition, Severity};
pub use model::configuration::Configuration;
pub use model::doctor::Doctor;
pub use model::document::Document;
pub use model::patient::{Address, Gender, Patient, Visit, VisitType};
pub use model::views::{DoctorVisit, PatientVisit};
pub use service::condition_service::ConditionService;
pub use service::doctor_service::DoctorService;
pub use service::patient_service::PatientService;
pub use service::view_session::ViewSession;
pub use service::visit_service::VisitService;
pub use session::error::{SessionError, SessionResult, SessionState};
pub use session::grouped::GroupQuery;
pub use session::query::{Direction, OrderBy, PageQuery, QueryResult};
pub use session::{SaveOutcome, Session};
pub use store::{get_store, init_store, DocumentStore, StoreError, StoreResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
