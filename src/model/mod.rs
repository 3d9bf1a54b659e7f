pub mod storage;
pub mod types;
pub mod validation;

pub use storage::{load_model_file, model_path, save_model_file, ModelFile, ScalingFactorRow, WeightRow};
pub use types::{Model, Range, StratumParams};
pub use validation::validate_model;
