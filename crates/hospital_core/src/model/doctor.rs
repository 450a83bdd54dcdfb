use crate::model::document::Document;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Option<String>,
    pub name: String,
    pub department: Option<String>,
    pub age: Option<u32>,
}

impl Doctor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Document for Doctor {
    const COLLECTION: &'static str = "doctors";
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];
    const ORDER_FIELD: Option<&'static str> = Some("name");

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}
