//! Hospital domain records and their document-store bindings.
//!
//! # Responsibility
//! - Define the persisted entities (patients, doctors, conditions, configuration).
//! - Define read models produced by grouped queries.
//!
//! # Invariants
//! - Every persisted entity implements [`Document`] with a stable collection.
//! - JSON field names are camelCase; query field paths refer to them.

pub mod condition;
pub mod configuration;
pub mod doctor;
pub mod document;
pub mod patient;
pub mod views;
