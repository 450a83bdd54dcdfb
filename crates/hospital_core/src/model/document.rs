//! Binding between typed entities and stored JSON documents.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A persisted, identity-bearing record.
///
/// Implementors describe the collection they live in plus the query profile
/// used by list/search views, so one generic runner serves every entity type.
pub trait Document: Serialize + DeserializeOwned {
    /// Collection name; also the prefix of store-assigned ids.
    const COLLECTION: &'static str;
    /// Fields matched by prefix search, OR-ed together.
    const SEARCH_FIELDS: &'static [&'static str] = &[];
    /// Default ordering field for list views.
    const ORDER_FIELD: Option<&'static str> = None;

    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
}

/// Builds a fresh store-assigned key for `collection`.
pub fn new_document_id(collection: &str) -> String {
    format!("{collection}/{}", uuid::Uuid::new_v4())
}
