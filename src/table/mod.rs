pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{indicator_path, load_year, load_years};
pub use types::*;
pub use validation::{validate_table, RawRecord, TableKeys};
