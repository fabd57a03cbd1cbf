//! # reporthub-entity
//!
//! Domain models for ReportHub. Every struct in this crate is either a
//! persisted record (a report job) or a value object carried inside one.
//! All entities derive `Debug`, `Clone`, `Serialize` and `Deserialize`.

pub mod job;
pub mod schedule;
