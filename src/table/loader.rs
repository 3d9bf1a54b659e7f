use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::types::{IndicatorSchema, IndicatorTable, Year};
use super::validation::{validate_table, RawRecord, TableKeys};
use crate::error::{EngineError, SchemaError};

/// Path of the indicator file for one year (`{dir}/indicators_{year}.json`)
pub fn indicator_path(dir: &Path, year: Year) -> PathBuf {
    dir.join(format!("indicators_{}.json", year))
}

/// Load and validate the indicator file for a single year.
///
/// Returns `Ok(None)` when no file exists for that year.
pub fn load_year(
    dir: &Path,
    year: Year,
    schema: &IndicatorSchema,
    keys: &TableKeys,
) -> Result<Option<IndicatorTable>, EngineError> {
    let path = indicator_path(dir, year);
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(&path)?;
    let records: Vec<RawRecord> = serde_json::from_reader(BufReader::new(file))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let table = validate_table(&records, schema, keys, Some(year)).map_err(|e| SchemaError {
        problems: e
            .problems
            .into_iter()
            .map(|p| format!("{} {}", file_name, p))
            .collect(),
    })?;

    tracing::debug!(year, rows = table.len(), path = %path.display(), "loaded indicator file");
    Ok(Some(table))
}

/// Load every requested year into one table.
///
/// Years without a file are skipped with a warning. Schema problems from all
/// files are collected into a single error.
pub fn load_years(
    dir: &Path,
    years: &BTreeSet<Year>,
    schema: &IndicatorSchema,
    keys: &TableKeys,
) -> Result<IndicatorTable, EngineError> {
    let mut table = IndicatorTable::default();
    let mut problems = Vec::new();

    for &year in years {
        match load_year(dir, year, schema, keys) {
            Ok(Some(year_table)) => table.extend(year_table),
            Ok(None) => {
                tracing::warn!(
                    year,
                    path = %indicator_path(dir, year).display(),
                    "indicator data not found, skipping year"
                );
            }
            Err(EngineError::Schema(e)) => problems.extend(e.problems),
            Err(e) => return Err(e),
        }
    }

    if !problems.is_empty() {
        return Err(SchemaError { problems }.into());
    }

    Ok(table)
}
