//! attainment-store — Storage collaborators.
//!
//! Implements the core `ProgressStore` trait over an in-memory [`Dataset`],
//! either held purely in memory (tests, embedding) or backed by a JSON
//! snapshot file (the CLI).

pub mod dataset;
pub mod error;
pub mod file;
pub mod memory;

pub use dataset::{Dataset, DatasetIssue, UnitRecord};
pub use error::StoreError;
pub use file::JsonFileStore;
pub use memory::MemoryStore;
