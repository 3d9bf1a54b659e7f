use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::SchemaError;
use crate::table::{reference_indicators, IndicatorSchema, IndicatorSpec, TableKeys, Year};

/// Main configuration.
///
/// Example YAML:
/// ```yaml
/// training_years: [2018, 2019, 2020]
/// all_years: [2018, 2019, 2020, 2023]
/// strata_key: Strata_ID
/// indicators:
///   - { name: max_ndvi_mean, sign: positive }
///   - { name: condition_variability, sign: negative }
///   # ... 8 in total
/// paths:
///   raw_data_dir: outputs/raw_data
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Years the model learns from
    pub training_years: BTreeSet<Year>,

    /// Years scored against the learned model (historical plus assessment years)
    pub all_years: BTreeSet<Year>,

    #[serde(default = "default_unit_key")]
    pub unit_key: String,

    #[serde(default = "default_strata_key")]
    pub strata_key: String,

    #[serde(default = "default_year_key")]
    pub year_key: String,

    /// Ordered indicator columns with their sign relative to yield
    #[serde(default = "reference_indicators")]
    pub indicators: Vec<IndicatorSpec>,

    #[serde(default)]
    pub paths: PathsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            training_years: [2018, 2019, 2020].into_iter().collect(),
            all_years: [2018, 2019, 2020, 2023].into_iter().collect(),
            unit_key: default_unit_key(),
            strata_key: default_strata_key(),
            year_key: default_year_key(),
            indicators: reference_indicators(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    pub fn schema(&self) -> Result<IndicatorSchema, SchemaError> {
        IndicatorSchema::new(self.indicators.clone())
    }

    pub fn table_keys(&self) -> TableKeys {
        TableKeys {
            unit_key: self.unit_key.clone(),
            strata_key: self.strata_key.clone(),
            year_key: self.year_key.clone(),
        }
    }
}

fn default_unit_key() -> String {
    "Unit_ID".to_string()
}

fn default_strata_key() -> String {
    "Strata_ID".to_string()
}

fn default_year_key() -> String {
    "Year".to_string()
}

/// Directory layout for inputs and outputs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Holds `indicators_{year}.json` files from the extraction step
    pub raw_data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data_dir: PathBuf::from("outputs/raw_data"),
            model_dir: PathBuf::from("outputs/model"),
            results_dir: PathBuf::from("outputs/results"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Sign;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.training_years.len(), 3);
        assert!(config.all_years.contains(&2023));
        assert_eq!(config.strata_key, "Strata_ID");
        assert_eq!(config.indicators.len(), 8);
        assert!(config.schema().is_ok());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::default();
        let yaml = serde_saphyr::to_string(&config).unwrap();
        let parsed: Config = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_minimal_config_parse() {
        let yaml = r#"
training_years: [2018, 2019]
all_years: [2018, 2019, 2024]
"#;
        let config: Config = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(config.training_years, [2018, 2019].into_iter().collect());
        assert_eq!(config.unit_key, "Unit_ID");
        assert_eq!(config.indicators, reference_indicators());
        assert_eq!(config.paths, PathsConfig::default());
    }

    #[test]
    fn test_custom_keys_and_signs() {
        let yaml = r#"
training_years: [2018]
all_years: [2018]
strata_key: soil_zone
indicators:
  - { name: a, sign: positive }
  - { name: b, sign: negative }
paths:
  raw_data_dir: data/raw
  model_dir: data/model
  results_dir: data/results
"#;
        let config: Config = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(config.strata_key, "soil_zone");
        assert_eq!(config.table_keys().strata_key, "soil_zone");
        assert_eq!(config.indicators[1].sign, Sign::Negative);
        assert_eq!(config.paths.model_dir, PathBuf::from("data/model"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
training_years: [2018]
all_years: [2018]
asset_id: projects/foo
"#;
        assert!(serde_saphyr::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_rainfall_section_rejected() {
        // Rainfall is capped before indicator files are written, not by the engine
        let yaml = r#"
training_years: [2018]
all_years: [2018]
rainfall:
  cap_ratio: 1.25
"#;
        assert!(serde_saphyr::from_str::<Config>(yaml).is_err());
    }
}
