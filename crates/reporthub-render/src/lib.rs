//! # reporthub-render
//!
//! Turns report bodies into bytes and stores them. Provides the
//! [`Renderer`] capability with JSON, CSV and document renderers, and a
//! local filesystem [`ArtifactStore`](reporthub_core::traits::ArtifactStore).

pub mod csv;
pub mod providers;
pub mod renderer;

pub use providers::LocalArtifactStore;
pub use renderer::{Renderer, ReportRenderer};
