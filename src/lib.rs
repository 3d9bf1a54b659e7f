//! Crop Health Factor engine.
//!
//! Learns per-stratum min-max bounds and entropy weights for eight
//! satellite-derived indicators from training years, then scores every
//! (unit, year) row against those fixed parameters.

pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod scoring;
pub mod table;

pub use error::{Diagnostic, EngineError, ModelIncompleteError, SchemaError};
