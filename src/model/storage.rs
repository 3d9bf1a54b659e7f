use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::types::{Model, Range, StratumParams};
use crate::error::EngineError;
use crate::table::{IndicatorSpec, StrataId, Year, INDICATOR_COUNT};

pub const MODEL_VERSION: u32 = 1;

/// Get the model file path inside a model directory (`{dir}/model.json`)
pub fn model_path(dir: &Path) -> PathBuf {
    dir.join("model.json")
}

/// One row of the scaling factor table. Both bounds are empty for an
/// indicator with no training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingFactorRow {
    pub strata_id: StrataId,
    pub indicator: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRow {
    pub strata_id: StrataId,
    pub indicator: String,
    pub weight: f64,
}

/// Persisted form of a model: two keyed tables plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub version: u32,
    pub trained_at: DateTime<Utc>,
    pub training_years: Vec<Year>,
    /// Indicator order and the sign each was normalized with
    pub indicators: Vec<IndicatorSpec>,
    pub scaling_factors: Vec<ScalingFactorRow>,
    pub weights: Vec<WeightRow>,
}

impl ModelFile {
    pub fn from_model(model: &Model, training_years: &BTreeSet<Year>, trained_at: DateTime<Utc>) -> Self {
        let mut scaling_factors = Vec::with_capacity(model.len() * INDICATOR_COUNT);
        let mut weights = Vec::with_capacity(model.len() * INDICATOR_COUNT);

        for (strata_id, params) in model.iter() {
            for (j, indicator) in model.indicators().iter().enumerate() {
                let bounds = params.ranges()[j].bounds();
                scaling_factors.push(ScalingFactorRow {
                    strata_id: strata_id.clone(),
                    indicator: indicator.name.clone(),
                    min: bounds.map(|(min, _)| min),
                    max: bounds.map(|(_, max)| max),
                });
                weights.push(WeightRow {
                    strata_id: strata_id.clone(),
                    indicator: indicator.name.clone(),
                    weight: params.weights()[j],
                });
            }
        }

        Self {
            version: MODEL_VERSION,
            trained_at,
            training_years: training_years.iter().copied().collect(),
            indicators: model.indicators().to_vec(),
            scaling_factors,
            weights,
        }
    }

    /// Rebuild the in-memory model. Every stratum must have exactly one
    /// scaling factor and one weight for each indicator.
    pub fn into_model(self) -> Result<Model, EngineError> {
        if self.version != MODEL_VERSION {
            return Err(EngineError::InvalidModel(format!(
                "unsupported model version: {}",
                self.version
            )));
        }
        if self.indicators.len() != INDICATOR_COUNT {
            return Err(EngineError::InvalidModel(format!(
                "expected {} indicators, found {}",
                INDICATOR_COUNT,
                self.indicators.len()
            )));
        }

        let position = |name: &str| -> Result<usize, EngineError> {
            self.indicators
                .iter()
                .position(|i| i.name == name)
                .ok_or_else(|| EngineError::InvalidModel(format!("unknown indicator '{}'", name)))
        };

        let mut ranges: BTreeMap<StrataId, [Option<Range>; INDICATOR_COUNT]> = BTreeMap::new();
        for row in &self.scaling_factors {
            let j = position(&row.indicator)?;
            let range = Range::from_bounds(row.min, row.max).map_err(|e| {
                EngineError::InvalidModel(format!("{} / {}: {}", row.strata_id, row.indicator, e))
            })?;
            let slot = &mut ranges.entry(row.strata_id.clone()).or_default()[j];
            if slot.replace(range).is_some() {
                return Err(EngineError::InvalidModel(format!(
                    "duplicate scaling factor for {} / {}",
                    row.strata_id, row.indicator
                )));
            }
        }

        let mut weights: BTreeMap<StrataId, [Option<f64>; INDICATOR_COUNT]> = BTreeMap::new();
        for row in &self.weights {
            let j = position(&row.indicator)?;
            if !row.weight.is_finite() || row.weight < 0.0 {
                return Err(EngineError::InvalidModel(format!(
                    "invalid weight {} for {} / {}",
                    row.weight, row.strata_id, row.indicator
                )));
            }
            let slot = &mut weights.entry(row.strata_id.clone()).or_default()[j];
            if slot.replace(row.weight).is_some() {
                return Err(EngineError::InvalidModel(format!(
                    "duplicate weight for {} / {}",
                    row.strata_id, row.indicator
                )));
            }
        }

        let mut strata = BTreeMap::new();
        for (strata_id, stratum_ranges) in ranges {
            let stratum_weights = weights.remove(&strata_id).ok_or_else(|| {
                EngineError::InvalidModel(format!("stratum {} has no weights", strata_id))
            })?;
            let incomplete = |what: &str| {
                EngineError::InvalidModel(format!("stratum {} has incomplete {}", strata_id, what))
            };

            let mut r = [Range::Unobserved; INDICATOR_COUNT];
            for (slot, range) in r.iter_mut().zip(stratum_ranges) {
                *slot = range.ok_or_else(|| incomplete("scaling factors"))?;
            }
            let mut w = [0.0; INDICATOR_COUNT];
            for (slot, weight) in w.iter_mut().zip(stratum_weights) {
                *slot = weight.ok_or_else(|| incomplete("weights"))?;
            }

            strata.insert(strata_id, StratumParams::new(r, w));
        }

        if let Some(strata_id) = weights.keys().next() {
            return Err(EngineError::InvalidModel(format!(
                "stratum {} has weights but no scaling factors",
                strata_id
            )));
        }

        Ok(Model::new(self.indicators, strata))
    }
}

/// Load a persisted model file
pub fn load_model_file(path: &Path) -> Result<ModelFile> {
    if !path.exists() {
        anyhow::bail!(
            "Model file not found at {}. Run `chf train` first",
            path.display()
        );
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open model file at {}", path.display()))?;

    let model_file: ModelFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse model file at {}", path.display()))?;

    Ok(model_file)
}

/// Save a model file atomically
///
/// Uses atomic-write-file so a scoring run never sees a half-written model.
/// Creates the parent directory if it doesn't exist.
pub fn save_model_file(path: &Path, model_file: &ModelFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create model directory at {}", parent.display()))?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, model_file).context("Failed to serialize model")?;

    file.commit().context("Failed to save model")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;


    fn sample_model() -> Model {
        let mut ranges = [Range::Normal { min: 0.0, max: 10.0 }; INDICATOR_COUNT];
        ranges[2] = Range::Degenerate { value: 4.5 };
        ranges[5] = Range::Unobserved;
        let weights = [0.3, 0.1, 0.0, 0.2, 0.15, 0.0, 0.05, 0.2];

        let mut strata = BTreeMap::new();
        strata.insert(StrataId::from("101"), StratumParams::new(ranges, weights));
        strata.insert(
            StrataId::from("102"),
            StratumParams::new(
                [Range::Degenerate { value: 1.0 }; INDICATOR_COUNT],
                [0.0; INDICATOR_COUNT],
            ),
        );
        Model::new(crate::table::reference_indicators(), strata)
    }

    fn trained_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_model_file_has_row_per_stratum_indicator() {
        let years: BTreeSet<Year> = [2018, 2019, 2020].into_iter().collect();
        let file = ModelFile::from_model(&sample_model(), &years, trained_at());
        assert_eq!(file.scaling_factors.len(), 2 * INDICATOR_COUNT);
        assert_eq!(file.weights.len(), 2 * INDICATOR_COUNT);
        assert_eq!(file.training_years, vec![2018, 2019, 2020]);

        let unobserved = &file.scaling_factors[5];
        assert_eq!(unobserved.indicator, "rainy_days_mean");
        assert_eq!((unobserved.min, unobserved.max), (None, None));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_path(&dir.path().join("model"));
        let years: BTreeSet<Year> = [2018, 2019].into_iter().collect();
        let model = sample_model();

        save_model_file(&path, &ModelFile::from_model(&model, &years, trained_at())).unwrap();
        let loaded = load_model_file(&path).unwrap();

        assert_eq!(loaded.trained_at, trained_at());
        assert_eq!(loaded.into_model().unwrap(), model);
    }

    #[test]
    fn test_model_file_records_signs() {
        let file = ModelFile::from_model(&sample_model(), &BTreeSet::new(), trained_at());
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(
            json["indicators"][7],
            serde_json::json!({ "name": "condition_variability", "sign": "negative" })
        );
        assert_eq!(json["indicators"][0]["sign"], "positive");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_model_file(&model_path(dir.path())).unwrap_err();
        assert!(err.to_string().contains("Model file not found"));
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let years = BTreeSet::new();
        let mut file = ModelFile::from_model(&sample_model(), &years, trained_at());
        file.version = 2;
        let err = file.into_model().unwrap_err();
        assert!(err.to_string().contains("unsupported model version: 2"));
    }

    #[test]
    fn test_rejects_missing_weight_row() {
        let years = BTreeSet::new();
        let mut file = ModelFile::from_model(&sample_model(), &years, trained_at());
        file.weights.remove(3);
        let err = file.into_model().unwrap_err();
        assert!(err.to_string().contains("stratum 101 has incomplete weights"));
    }

    #[test]
    fn test_rejects_unknown_indicator() {
        let years = BTreeSet::new();
        let mut file = ModelFile::from_model(&sample_model(), &years, trained_at());
        file.scaling_factors[0].indicator = "ndwi".to_string();
        let err = file.into_model().unwrap_err();
        assert!(err.to_string().contains("unknown indicator 'ndwi'"));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let years = BTreeSet::new();
        let mut file = ModelFile::from_model(&sample_model(), &years, trained_at());
        file.scaling_factors[0].min = Some(20.0);
        let err = file.into_model().unwrap_err();
        assert!(err.to_string().contains("min 20 is greater than max 10"));
    }
}
