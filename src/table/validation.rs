use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::types::{IndicatorRow, IndicatorSchema, IndicatorTable, StrataId, UnitId, Year, INDICATOR_COUNT};
use crate::error::SchemaError;

/// A record as handed over by the extraction step, before validation.
pub type RawRecord = Map<String, Value>;

/// Column names used for the identifying fields of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableKeys {
    pub unit_key: String,
    pub strata_key: String,
    pub year_key: String,
}

impl Default for TableKeys {
    fn default() -> Self {
        Self {
            unit_key: "Unit_ID".to_string(),
            strata_key: "Strata_ID".to_string(),
            year_key: "Year".to_string(),
        }
    }
}

/// Validate raw records against the strict indicator schema.
///
/// Every record must carry a unit id, a strata id and a year (either in the
/// record or through `default_year`), and exactly the schema's indicator
/// columns. `null` indicator values are legal and become missing values.
/// Returns all problems at once (not just the first).
pub fn validate_table(
    records: &[RawRecord],
    schema: &IndicatorSchema,
    keys: &TableKeys,
    default_year: Option<Year>,
) -> Result<IndicatorTable, SchemaError> {
    let mut problems = Vec::new();
    let mut rows = Vec::with_capacity(records.len());

    let expected: BTreeSet<&str> = schema.names().collect();
    let mut seen: BTreeMap<(UnitId, Year), usize> = BTreeMap::new();

    for (i, record) in records.iter().enumerate() {
        let mut row_problems = Vec::new();

        let unit_id = match identifier(record.get(&keys.unit_key)) {
            Some(id) => Some(UnitId(id)),
            None => {
                row_problems.push(format!("row {}: missing {}", i, keys.unit_key));
                None
            }
        };

        let strata_id = match identifier(record.get(&keys.strata_key)) {
            Some(id) => Some(StrataId(id)),
            None => {
                row_problems.push(format!("row {}: missing {}", i, keys.strata_key));
                None
            }
        };

        let year = match (record.get(&keys.year_key), default_year) {
            (Some(value), default) => match value.as_i64().and_then(|y| Year::try_from(y).ok()) {
                Some(y) if default.map_or(true, |d| d == y) => Some(y),
                Some(y) => {
                    row_problems.push(format!(
                        "row {}: {} {} does not match file year {}",
                        i,
                        keys.year_key,
                        y,
                        default.unwrap_or_default()
                    ));
                    None
                }
                None => {
                    row_problems.push(format!(
                        "row {}: {} is not an integer: {}",
                        i, keys.year_key, value
                    ));
                    None
                }
            },
            (None, Some(d)) => Some(d),
            (None, None) => {
                row_problems.push(format!("row {}: missing {}", i, keys.year_key));
                None
            }
        };

        // Strict schema: indicator columns are everything except the key columns
        let present: BTreeSet<&str> = record
            .keys()
            .map(String::as_str)
            .filter(|k| *k != keys.unit_key && *k != keys.strata_key && *k != keys.year_key)
            .collect();
        for missing in expected.difference(&present) {
            row_problems.push(format!("row {}: missing column '{}'", i, missing));
        }
        for extra in present.difference(&expected) {
            row_problems.push(format!("row {}: unexpected column '{}'", i, extra));
        }

        let mut values = [None; INDICATOR_COUNT];
        for (j, spec) in schema.indicators().iter().enumerate() {
            match record.get(&spec.name) {
                None | Some(Value::Null) => {}
                Some(value) => match value.as_f64() {
                    Some(v) if v.is_finite() => values[j] = Some(v),
                    _ => row_problems.push(format!(
                        "row {}: column '{}' is not a number: {}",
                        i, spec.name, value
                    )),
                },
            }
        }

        // One row per (unit, year)
        if let (Some(unit_id), Some(year)) = (&unit_id, year) {
            match seen.get(&(unit_id.clone(), year)) {
                Some(first) => row_problems.push(format!(
                    "row {}: duplicate {} '{}' for {} {} (first seen in row {})",
                    i, keys.unit_key, unit_id, keys.year_key, year, first
                )),
                None => {
                    seen.insert((unit_id.clone(), year), i);
                }
            }
        }

        if row_problems.is_empty() {
            if let (Some(unit_id), Some(strata_id), Some(year)) = (unit_id, strata_id, year) {
                rows.push(IndicatorRow {
                    unit_id,
                    year,
                    strata_id,
                    values,
                });
            }
        } else {
            problems.extend(row_problems);
        }
    }

    if problems.is_empty() {
        Ok(IndicatorTable::new(rows))
    } else {
        Err(SchemaError { problems })
    }
}

/// Identifiers may arrive as strings or integers (e.g. `"U_1"` or `101`).
fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
