//! Read models produced by grouped visit queries.
//!
//! Field names match the aliases declared by the corresponding
//! [`GroupQuery`](crate::session::grouped::GroupQuery) builders.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One row of the visit history grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientVisit {
    pub date: NaiveDateTime,
    pub doctor_name: Option<String>,
    pub visit_summary: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub count: u64,
}

/// Number of recorded visits per doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorVisit {
    pub doctor_id: String,
    #[serde(default)]
    pub doctor_name: Option<String>,
    pub count: u64,
}
