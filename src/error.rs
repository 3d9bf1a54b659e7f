use std::fmt;
use thiserror::Error;

use crate::table::StrataId;

/// The indicator table (or schema) does not match the configured indicators.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("schema error: {}", .problems.join("; "))]
pub struct SchemaError {
    pub problems: Vec<String>,
}

/// Strata that scoring needs but the model has no entry for.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("model has no entry for strata: {}", join_ids(.missing))]
pub struct ModelIncompleteError {
    pub missing: Vec<StrataId>,
}

fn join_ids(ids: &[StrataId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    ModelIncomplete(#[from] ModelIncompleteError),

    #[error("no training rows found for years {0:?}")]
    NoTrainingData(Vec<i32>),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("stratum worker failed: {0}")]
    Worker(String),
}

/// Non-fatal findings surfaced to the operator alongside results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Every indicator in the stratum had zero variance (or no data), so all
    /// weights are 0 and every row in it scores 0.
    DegenerateStratum { strata_id: StrataId },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DegenerateStratum { strata_id } => write!(
                f,
                "stratum {} is degenerate: all indicator weights are zero, scores will be 0",
                strata_id
            ),
        }
    }
}
