//! Binary attachments and their merge into list rows.
//!
//! # Responsibility
//! - Model named binary payloads owned by a document.
//! - Merge the primary attachment of each query row into a composite row.
//!
//! # Invariants
//! - Only the primary attachment (see [`PRIMARY_ATTACHMENT`]) is fetched per row.
//! - A failed payload fetch degrades that row to "no attachment"; it never fails
//!   the page.
//! - Failing to list attachment names is a store failure and propagates.

use crate::model::document::Document;
use crate::model::patient::Patient;
use crate::session::error::SessionResult;
use crate::session::query::QueryResult;
use log::warn;
use std::fmt::{Debug, Formatter};

/// Conventional attachment name for patient profile pictures.
pub const PROFILE_PICTURE_NAME: &str = "profile-picture";

/// Rule choosing which attachment a list view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAttachment {
    /// The attachment stored first; replacing it by name keeps its slot.
    FirstStored,
}

impl PrimaryAttachment {
    pub fn select(self, names: &[AttachmentName]) -> Option<&AttachmentName> {
        match self {
            Self::FirstStored => names.first(),
        }
    }
}

/// Policy used by views and the merger.
pub const PRIMARY_ATTACHMENT: PrimaryAttachment = PrimaryAttachment::FirstStored;

/// Attachment metadata, listed in storage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentName {
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn profile_picture(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(PROFILE_PICTURE_NAME, content_type, bytes)
    }
}

impl Debug for Attachment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Entity plus its primary attachment, as rendered and edited by views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithAttachment<T> {
    pub entity: T,
    pub attachment: Option<Attachment>,
}

impl<T> WithAttachment<T> {
    pub fn new(entity: T) -> Self {
        Self {
            entity,
            attachment: None,
        }
    }

    pub fn with_attachment(entity: T, attachment: Attachment) -> Self {
        Self {
            entity,
            attachment: Some(attachment),
        }
    }
}

pub type PatientWithPicture = WithAttachment<Patient>;

/// Read access to committed attachments.
pub trait AttachmentSource {
    fn attachment_names(&self, document_id: &str) -> SessionResult<Vec<AttachmentName>>;
    fn fetch_attachment(
        &self,
        document_id: &str,
        name: &AttachmentName,
    ) -> SessionResult<Attachment>;
}

/// Attaches each row's primary attachment, degrading failed fetches.
pub fn merge_primary_attachments<T, S>(
    source: &S,
    result: QueryResult<T>,
) -> SessionResult<QueryResult<WithAttachment<T>>>
where
    T: Document,
    S: AttachmentSource + ?Sized,
{
    let mut rows = Vec::with_capacity(result.rows.len());
    for entity in result.rows {
        let attachment = match entity.id() {
            Some(id) => primary_attachment(source, id)?,
            None => None,
        };
        rows.push(WithAttachment { entity, attachment });
    }

    Ok(QueryResult {
        rows,
        total: result.total,
    })
}

fn primary_attachment<S: AttachmentSource + ?Sized>(
    source: &S,
    document_id: &str,
) -> SessionResult<Option<Attachment>> {
    let names = source.attachment_names(document_id)?;
    let Some(primary) = PRIMARY_ATTACHMENT.select(&names) else {
        return Ok(None);
    };

    match source.fetch_attachment(document_id, primary) {
        Ok(attachment) => Ok(Some(attachment)),
        Err(err) => {
            warn!(
                "event=attachment_fetch module=attachment status=degraded document_id={} name={} error={}",
                document_id, primary.name, err
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        merge_primary_attachments, Attachment, AttachmentName, AttachmentSource,
        PrimaryAttachment,
    };
    use crate::model::doctor::Doctor;
    use crate::session::error::{SessionError, SessionResult};
    use crate::session::query::QueryResult;
    use std::cell::RefCell;

    struct FakeSource {
        names: Vec<AttachmentName>,
        fail_fetch: bool,
        fetched: RefCell<Vec<String>>,
    }

    impl AttachmentSource for FakeSource {
        fn attachment_names(&self, _document_id: &str) -> SessionResult<Vec<AttachmentName>> {
            Ok(self.names.clone())
        }

        fn fetch_attachment(
            &self,
            document_id: &str,
            name: &AttachmentName,
        ) -> SessionResult<Attachment> {
            self.fetched.borrow_mut().push(name.name.clone());
            if self.fail_fetch {
                return Err(SessionError::AttachmentFetch {
                    document_id: document_id.to_string(),
                    name: name.name.clone(),
                    source: "disk read failed".into(),
                });
            }
            Ok(Attachment::new(
                name.name.clone(),
                name.content_type.clone(),
                vec![1, 2, 3],
            ))
        }
    }

    fn name(value: &str) -> AttachmentName {
        AttachmentName {
            name: value.to_string(),
            content_type: "image/png".to_string(),
            size: 3,
        }
    }

    fn doctor_page() -> QueryResult<Doctor> {
        let mut doctor = Doctor::new("House");
        doctor.id = Some("doctors/1".to_string());
        QueryResult {
            rows: vec![doctor],
            total: 4,
        }
    }

    #[test]
    fn primary_policy_picks_first_stored() {
        let names = vec![name("a.png"), name("b.png")];
        assert_eq!(
            PrimaryAttachment::FirstStored.select(&names).map(|n| n.name.as_str()),
            Some("a.png")
        );
        assert!(PrimaryAttachment::FirstStored.select(&[]).is_none());
    }

    #[test]
    fn only_the_primary_attachment_is_fetched() {
        let source = FakeSource {
            names: vec![name("a.png"), name("b.png")],
            fail_fetch: false,
            fetched: RefCell::new(Vec::new()),
        };
        let merged = merge_primary_attachments(&source, doctor_page()).unwrap();
        assert_eq!(*source.fetched.borrow(), vec!["a.png".to_string()]);
        assert_eq!(merged.rows[0].attachment.as_ref().unwrap().bytes, vec![1, 2, 3]);
        assert_eq!(merged.total, 4);
    }

    #[test]
    fn failed_fetch_keeps_row_without_attachment() {
        let source = FakeSource {
            names: vec![name("a.png")],
            fail_fetch: true,
            fetched: RefCell::new(Vec::new()),
        };
        let merged = merge_primary_attachments(&source, doctor_page()).unwrap();
        assert_eq!(merged.rows.len(), 1);
        assert_eq!(merged.rows[0].entity.name, "House");
        assert!(merged.rows[0].attachment.is_none());
        assert_eq!(merged.total, 4);
    }

    #[test]
    fn debug_output_hides_payload_bytes() {
        let attachment = Attachment::profile_picture("image/jpeg", vec![0; 64]);
        let rendered = format!("{attachment:?}");
        assert!(rendered.contains("len: 64"));
        assert!(rendered.contains("profile-picture"));
    }
}
