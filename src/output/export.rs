use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::formatter::format_csv;
use crate::config::ensure_parent_dir;
use crate::scoring::ScoreResult;

/// Get the results file path inside a results directory (`{dir}/chf_scores.csv`)
pub fn results_path(dir: &Path) -> PathBuf {
    dir.join("chf_scores.csv")
}

/// Write CHF scores as CSV atomically
pub fn write_results_csv(path: &Path, results: &[ScoreResult]) -> Result<()> {
    ensure_parent_dir(path)?;

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    file.write_all(format_csv(results).as_bytes())
        .context("Failed to write scores")?;

    file.commit().context("Failed to save scores")?;

    Ok(())
}
