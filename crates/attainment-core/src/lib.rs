//! attainment-core — Scoring, feedback reconciliation and progress rollups.
//!
//! This crate turns stored submissions and feedback into per-pupil cells,
//! criterion and objective summaries, working levels and unit or subject
//! reports. Storage is reached only through the [`traits::ProgressStore`]
//! trait.

pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod latest;
pub mod level;
pub mod model;
pub mod mutation;
pub mod normalize;
pub mod report;
pub mod resolver;
pub mod rollup;
pub mod statistics;
pub mod trace;
pub mod traits;

pub use engine::{ProgressEngine, UnitSnapshot};
pub use error::{ProgressError, Result};
pub use trace::TraceContext;
