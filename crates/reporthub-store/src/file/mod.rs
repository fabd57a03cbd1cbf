//! Local filesystem job store.

pub mod store;

pub use store::FileJobStore;
