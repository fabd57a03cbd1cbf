//! Built-in report producers.
//!
//! Domain producers (country, organization, MoU and so on) depend on data
//! sources owned by the embedding application and are registered there.

pub mod custom;

pub use custom::CustomReportProducer;
