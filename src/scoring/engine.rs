use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Diagnostic, EngineError, ModelIncompleteError};
use crate::model::{validate_model, Model, StratumParams};
use crate::table::{IndicatorRow, IndicatorSchema, IndicatorSpec, IndicatorTable, StrataId, UnitId, Year};

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorContribution {
    pub indicator: String,
    pub value: Option<f64>,      // Raw value, None when missing
    pub normalized: Option<f64>, // None when missing or the range is not informative
    pub weight: f64,
    pub contribution: f64,       // weight * normalized, or 0
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub unit_id: UnitId,
    pub year: Year,
    pub strata_id: StrataId,
    pub score: f64,
    /// At least one indicator value was missing; its term contributed 0.
    pub incomplete: bool,
    pub breakdown: Vec<IndicatorContribution>,
}

#[derive(Debug, Clone)]
pub struct ScoreOutput {
    /// Sorted by (unit, year).
    pub scores: Vec<ScoreResult>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Applies a fixed model to indicator rows. Bounds are never re-derived from
/// the rows being scored.
#[derive(Debug, Clone)]
pub struct Scorer {
    schema: IndicatorSchema,
    model: Arc<Model>,
}

impl Scorer {
    /// The model must have been trained on the same indicators, in the same
    /// order and with the same signs.
    pub fn new(schema: IndicatorSchema, model: Arc<Model>) -> Result<Self, EngineError> {
        if schema.indicators() != model.indicators() {
            let describe = |specs: &[IndicatorSpec]| -> Vec<String> {
                specs.iter().map(|s| format!("{} ({:?})", s.name, s.sign)).collect()
            };
            return Err(EngineError::InvalidModel(format!(
                "model indicators {:?} do not match configured indicators {:?}",
                describe(model.indicators()),
                describe(schema.indicators())
            )));
        }
        Ok(Self { schema, model })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Fail with every stratum in the table that the model lacks.
    pub fn check_coverage(&self, table: &IndicatorTable) -> Result<(), ModelIncompleteError> {
        validate_model(&self.model, &table.strata())
    }

    /// Score every row of the table, sequentially.
    pub fn score(&self, table: &IndicatorTable) -> Result<ScoreOutput, EngineError> {
        self.check_coverage(table)?;

        let mut partitions = BTreeMap::new();
        for (strata_id, rows) in table.partition_by_stratum() {
            let scores = self.score_stratum(&strata_id, &rows)?;
            partitions.insert(strata_id, scores);
        }
        Ok(self.assemble(partitions))
    }

    /// Score the rows of one stratum.
    pub fn score_stratum(
        &self,
        strata_id: &StrataId,
        rows: &[IndicatorRow],
    ) -> Result<Vec<ScoreResult>, ModelIncompleteError> {
        let params = self.model.get(strata_id).ok_or_else(|| ModelIncompleteError {
            missing: vec![strata_id.clone()],
        })?;
        Ok(rows
            .iter()
            .map(|row| score_row(&self.schema, params, row))
            .collect())
    }

    /// Score a single row against its stratum's parameters.
    pub fn score_row(&self, row: &IndicatorRow) -> Result<ScoreResult, ModelIncompleteError> {
        let params = self.model.get(&row.strata_id).ok_or_else(|| ModelIncompleteError {
            missing: vec![row.strata_id.clone()],
        })?;
        Ok(score_row(&self.schema, params, row))
    }

    /// Merge per-stratum partitions into one (unit, year)-ordered output.
    pub fn assemble(&self, partitions: BTreeMap<StrataId, Vec<ScoreResult>>) -> ScoreOutput {
        let mut diagnostics = Vec::new();
        let mut scores = Vec::new();

        for (strata_id, results) in partitions {
            if self.model.get(&strata_id).is_some_and(StratumParams::is_degenerate) {
                tracing::warn!(strata_id = %strata_id, rows = results.len(), "scoring degenerate stratum, all scores are 0");
                diagnostics.push(Diagnostic::DegenerateStratum { strata_id });
            }
            scores.extend(results);
        }

        scores.sort_by(|a, b| {
            a.unit_id
                .cmp(&b.unit_id)
                .then(a.year.cmp(&b.year))
                .then(a.strata_id.cmp(&b.strata_id))
        });

        ScoreOutput {
            scores,
            diagnostics,
        }
    }
}

/// CHF = Σ W_j · normalized_ij. Missing values and non-informative ranges
/// contribute 0 and the remaining weights are not renormalized.
pub fn score_row(schema: &IndicatorSchema, params: &StratumParams, row: &IndicatorRow) -> ScoreResult {
    let mut score = 0.0;
    let mut breakdown = Vec::with_capacity(row.values.len());

    for (j, value) in row.values.iter().enumerate() {
        let weight = params.weights()[j];
        let normalized = value.and_then(|x| params.ranges()[j].normalize(x, schema.sign(j)));
        let contribution = normalized.map_or(0.0, |n| weight * n);
        score += contribution;

        breakdown.push(IndicatorContribution {
            indicator: schema.name(j).to_string(),
            value: *value,
            normalized,
            weight,
            contribution,
        });
    }

    ScoreResult {
        unit_id: row.unit_id.clone(),
        year: row.year,
        strata_id: row.strata_id.clone(),
        score,
        incomplete: !row.is_complete(),
        breakdown,
    }
}
