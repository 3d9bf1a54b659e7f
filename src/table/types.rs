use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::SchemaError;

/// Number of indicator columns every table row carries.
pub const INDICATOR_COUNT: usize = 8;

pub type Year = i32;

/// Identifier of a homogeneous stratum of insurance units.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrataId(pub String);

impl fmt::Display for StrataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StrataId {
    fn from(s: &str) -> Self {
        StrataId(s.to_string())
    }
}

/// Identifier of an insurance unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub String);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        UnitId(s.to_string())
    }
}

/// Direction in which an indicator relates to yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    /// Higher values mean healthier crops.
    Positive,
    /// Higher values mean worse crops; normalization is inverted.
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorSpec {
    pub name: String,
    pub sign: Sign,
}

impl IndicatorSpec {
    pub fn positive(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sign: Sign::Positive,
        }
    }

    pub fn negative(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sign: Sign::Negative,
        }
    }
}

/// The ordered, fixed-size set of indicators and their sign tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSchema {
    indicators: Vec<IndicatorSpec>,
}

impl IndicatorSchema {
    /// Build a schema. Requires exactly `INDICATOR_COUNT` uniquely named indicators.
    pub fn new(indicators: Vec<IndicatorSpec>) -> Result<Self, SchemaError> {
        let mut problems = Vec::new();
        if indicators.len() != INDICATOR_COUNT {
            problems.push(format!(
                "expected {} indicators, found {}",
                INDICATOR_COUNT,
                indicators.len()
            ));
        }
        let mut seen = BTreeSet::new();
        for spec in &indicators {
            if spec.name.trim().is_empty() {
                problems.push("indicator name must not be empty".to_string());
            } else if !seen.insert(spec.name.as_str()) {
                problems.push(format!("duplicate indicator '{}'", spec.name));
            }
        }
        if problems.is_empty() {
            Ok(Self { indicators })
        } else {
            Err(SchemaError { problems })
        }
    }

    /// Reference configuration: seven vegetation/radar/rainfall indicators plus
    /// condition variability, the only one that is negative for yield.
    pub fn reference() -> Self {
        Self {
            indicators: reference_indicators(),
        }
    }

    pub fn indicators(&self) -> &[IndicatorSpec] {
        &self.indicators
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(|s| s.name.as_str())
    }

    pub fn sign(&self, index: usize) -> Sign {
        self.indicators[index].sign
    }

    pub fn name(&self, index: usize) -> &str {
        &self.indicators[index].name
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.indicators.iter().position(|s| s.name == name)
    }
}

pub fn reference_indicators() -> Vec<IndicatorSpec> {
    vec![
        IndicatorSpec::positive("max_ndvi_mean"),
        IndicatorSpec::positive("max_lswi_mean"),
        IndicatorSpec::positive("max_backscatter_mean"),
        IndicatorSpec::positive("integrated_backscatter_mean"),
        IndicatorSpec::positive("integrated_fapar_mean"),
        IndicatorSpec::positive("rainy_days_mean"),
        IndicatorSpec::positive("adjusted_rainfall_mean"),
        IndicatorSpec::negative("condition_variability"),
    ]
}

/// One (unit, year) observation. `None` marks a missing indicator value.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub unit_id: UnitId,
    pub year: Year,
    pub strata_id: StrataId,
    pub values: [Option<f64>; INDICATOR_COUNT],
}

impl IndicatorRow {
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }
}

/// Validated indicator rows. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorTable {
    rows: Vec<IndicatorRow>,
}

impl IndicatorTable {
    pub fn new(rows: Vec<IndicatorRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn years(&self) -> BTreeSet<Year> {
        self.rows.iter().map(|r| r.year).collect()
    }

    pub fn strata(&self) -> BTreeSet<StrataId> {
        self.rows.iter().map(|r| r.strata_id.clone()).collect()
    }

    /// Rows whose year is in `years`.
    pub fn filter_years(&self, years: &BTreeSet<Year>) -> IndicatorTable {
        IndicatorTable {
            rows: self
                .rows
                .iter()
                .filter(|r| years.contains(&r.year))
                .cloned()
                .collect(),
        }
    }

    /// Group rows by stratum. Each partition is ordered by (unit, year) so
    /// downstream sums do not depend on input order.
    pub fn partition_by_stratum(&self) -> BTreeMap<StrataId, Vec<IndicatorRow>> {
        let mut partitions: BTreeMap<StrataId, Vec<IndicatorRow>> = BTreeMap::new();
        for row in &self.rows {
            partitions
                .entry(row.strata_id.clone())
                .or_default()
                .push(row.clone());
        }
        for rows in partitions.values_mut() {
            rows.sort_by(|a, b| a.unit_id.cmp(&b.unit_id).then(a.year.cmp(&b.year)));
        }
        partitions
    }

    pub fn extend(&mut self, other: IndicatorTable) {
        self.rows.extend(other.rows);
    }
}
