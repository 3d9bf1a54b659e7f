use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Diagnostic, EngineError};
use crate::model::{Model, Range, StratumParams};
use crate::table::{IndicatorRow, IndicatorSchema, IndicatorTable, Sign, StrataId, Year, INDICATOR_COUNT};

/// Result of a training run: the model plus any non-fatal findings.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub model: Model,
    pub diagnostics: Vec<Diagnostic>,
}

/// Learns per-stratum scaling factors and entropy weights from training years.
#[derive(Debug, Clone)]
pub struct Trainer {
    schema: IndicatorSchema,
    training_years: BTreeSet<Year>,
}

impl Trainer {
    pub fn new(schema: IndicatorSchema, training_years: BTreeSet<Year>) -> Self {
        Self {
            schema,
            training_years,
        }
    }

    pub fn schema(&self) -> &IndicatorSchema {
        &self.schema
    }

    pub fn training_years(&self) -> &BTreeSet<Year> {
        &self.training_years
    }

    /// Restrict the table to training years, failing when nothing is left.
    pub fn training_table(&self, table: &IndicatorTable) -> Result<IndicatorTable, EngineError> {
        let training = table.filter_years(&self.training_years);
        if training.is_empty() {
            return Err(EngineError::NoTrainingData(
                self.training_years.iter().copied().collect(),
            ));
        }
        Ok(training)
    }

    /// Train every stratum sequentially.
    pub fn train(&self, table: &IndicatorTable) -> Result<TrainOutput, EngineError> {
        let training = self.training_table(table)?;
        let trained = training
            .partition_by_stratum()
            .into_iter()
            .map(|(strata_id, rows)| {
                let params = self.train_stratum(&rows);
                (strata_id, params)
            })
            .collect();
        Ok(self.assemble(trained))
    }

    /// Build the model from per-stratum results, collecting diagnostics.
    pub fn assemble(&self, trained: BTreeMap<StrataId, StratumParams>) -> TrainOutput {
        let diagnostics: Vec<Diagnostic> = trained
            .iter()
            .filter(|(_, params)| params.is_degenerate())
            .map(|(strata_id, _)| {
                tracing::warn!(strata_id = %strata_id, "degenerate stratum: every indicator has zero variance");
                Diagnostic::DegenerateStratum {
                    strata_id: strata_id.clone(),
                }
            })
            .collect();

        TrainOutput {
            model: Model::new(self.schema.indicators().to_vec(), trained),
            diagnostics,
        }
    }

    /// Learn bounds and weights for one stratum's training rows.
    pub fn train_stratum(&self, rows: &[IndicatorRow]) -> StratumParams {
        let mut ranges = [Range::Unobserved; INDICATOR_COUNT];
        let mut divergences = [0.0; INDICATOR_COUNT];

        for j in 0..INDICATOR_COUNT {
            let values: Vec<f64> = rows.iter().filter_map(|r| r.values[j]).collect();
            ranges[j] = Range::learn(values.iter().copied());
            divergences[j] = divergence(&ranges[j], self.schema.sign(j), &values, rows.len());
        }

        StratumParams::new(ranges, entropy_weights(&divergences))
    }
}

/// Degree of divergence `1 - E_j` for one indicator column.
///
/// `n` is the number of rows in the stratum, missing values included, so
/// `k = 1 / ln(n)` is shared by every indicator of the stratum. Non-informative
/// ranges carry no information (`E_j = 1`), as does a stratum with fewer than
/// two rows, where `k` is undefined.
fn divergence(range: &Range, sign: Sign, values: &[f64], n: usize) -> f64 {
    if !range.is_informative() || n < 2 {
        return 0.0;
    }

    let normalized: Vec<f64> = values
        .iter()
        .filter_map(|&x| range.normalize(x, sign))
        .collect();

    let total: f64 = normalized.iter().sum();
    // 0 * ln(0) := 0; an all-zero column has every P_ij = 0
    let entropy = if total == 0.0 {
        0.0
    } else {
        let k = 1.0 / (n as f64).ln();
        let sum: f64 = normalized
            .iter()
            .map(|v| v / total)
            .filter(|p| *p > 0.0)
            .map(|p| p * p.ln())
            .sum();
        -k * sum
    };

    // rounding can push a near-uniform column just past E_j = 1
    (1.0 - entropy).max(0.0)
}

/// `W_j = D_j / Σ D_j`, or all zero when no indicator diverges.
fn entropy_weights(divergences: &[f64; INDICATOR_COUNT]) -> [f64; INDICATOR_COUNT] {
    let total: f64 = divergences.iter().sum();
    if total == 0.0 {
        return [0.0; INDICATOR_COUNT];
    }
    divergences.map(|d| d / total)
}
