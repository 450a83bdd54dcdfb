//! Patient aggregate with embedded address and visit history.
//!
//! # Invariants
//! - Visits have no identity of their own; they live and die with the patient.
//! - `birthDate` serializes as `YYYY-MM-DD`, so string order is date order.

use crate::model::document::Document;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub code: Option<String>,
}

/// Kind of encounter recorded in a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitType {
    Consultation,
    Emergency,
    Hospitalization,
    FollowUp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub date: Option<NaiveDateTime>,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<VisitType>,
    pub visit_summary: Option<String>,
    pub condition_id: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub address: Option<Address>,
    #[serde(default)]
    pub visits: Vec<Visit>,
}

impl Patient {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    /// Finds the visit recorded at exactly `date`.
    pub fn visit_at(&self, date: NaiveDateTime) -> Option<&Visit> {
        self.visits.iter().find(|visit| visit.date == Some(date))
    }
}

impl Document for Patient {
    const COLLECTION: &'static str = "patients";
    const SEARCH_FIELDS: &'static [&'static str] = &["firstName"];
    const ORDER_FIELD: Option<&'static str> = Some("birthDate");

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}
