//! Core type definitions used across the ReportHub workspace.

pub mod id;

pub use id::*;
