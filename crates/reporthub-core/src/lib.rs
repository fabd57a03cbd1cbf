//! # reporthub-core
//!
//! Core crate for ReportHub. Contains the collaborator traits the job
//! scheduler consumes (record store, artifact store), configuration
//! schemas, typed identifiers, and the unified error system.
//!
//! This crate has **no** internal dependencies on other ReportHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
