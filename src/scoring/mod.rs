pub mod engine;
pub mod trainer;

pub use engine::{score_row, IndicatorContribution, ScoreOutput, ScoreResult, Scorer};
pub use trainer::{TrainOutput, Trainer};
