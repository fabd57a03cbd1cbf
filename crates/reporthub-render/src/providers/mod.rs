//! Artifact store implementations.

#[cfg(feature = "local")]
pub mod local;

#[cfg(feature = "local")]
pub use local::LocalArtifactStore;
