pub mod export;
pub mod formatter;

pub use export::{results_path, write_results_csv};
pub use formatter::{
    format_breakdown, format_csv, format_diagnostic, format_results_table, format_score,
    format_weights_table, should_use_colors,
};
