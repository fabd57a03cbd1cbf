//! Core traits defined in `reporthub-core` and implemented by other crates.

pub mod artifact;
pub mod record_store;

pub use artifact::ArtifactStore;
pub use record_store::{RecordFilter, RecordStore};
