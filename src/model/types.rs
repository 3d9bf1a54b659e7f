use std::collections::BTreeMap;

use crate::table::{IndicatorSpec, Sign, StrataId, INDICATOR_COUNT};

/// Normalization bounds learned for one (stratum, indicator).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Range {
    /// `min < max`; values normalize by min-max scaling.
    Normal { min: f64, max: f64 },
    /// Every training value was `value`. Carries no information.
    Degenerate { value: f64 },
    /// No training value was present for this indicator.
    Unobserved,
}

impl Range {
    /// Learn bounds from the non-missing training values.
    pub fn learn<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut bounds: Option<(f64, f64)> = None;
        for v in values {
            bounds = Some(match bounds {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            });
        }
        match bounds {
            None => Range::Unobserved,
            Some((min, max)) if min == max => Range::Degenerate { value: min },
            Some((min, max)) => Range::Normal { min, max },
        }
    }

    /// Rebuild a range from persisted bounds.
    pub fn from_bounds(min: Option<f64>, max: Option<f64>) -> Result<Self, String> {
        match (min, max) {
            (None, None) => Ok(Range::Unobserved),
            (Some(min), Some(max)) if min == max => Ok(Range::Degenerate { value: min }),
            (Some(min), Some(max)) if min < max => Ok(Range::Normal { min, max }),
            (Some(min), Some(max)) => Err(format!("min {} is greater than max {}", min, max)),
            _ => Err("min and max must both be set or both be empty".to_string()),
        }
    }

    /// `(min, max)`, or `None` when nothing was observed.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match *self {
            Range::Normal { min, max } => Some((min, max)),
            Range::Degenerate { value } => Some((value, value)),
            Range::Unobserved => None,
        }
    }

    /// Min-max normalize `x`, inverted for negative indicators.
    ///
    /// Not clamped: values outside the learned bounds map outside `[0, 1]`.
    /// Only `Normal` ranges normalize; the other variants return `None`.
    pub fn normalize(&self, x: f64, sign: Sign) -> Option<f64> {
        match *self {
            Range::Normal { min, max } => {
                let scaled = (x - min) / (max - min);
                Some(match sign {
                    Sign::Positive => scaled,
                    Sign::Negative => 1.0 - scaled,
                })
            }
            Range::Degenerate { .. } | Range::Unobserved => None,
        }
    }

    pub fn is_informative(&self) -> bool {
        matches!(self, Range::Normal { .. })
    }
}

/// Everything learned for one stratum: bounds and weights per indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StratumParams {
    ranges: [Range; INDICATOR_COUNT],
    weights: [f64; INDICATOR_COUNT],
}

impl StratumParams {
    pub fn new(ranges: [Range; INDICATOR_COUNT], weights: [f64; INDICATOR_COUNT]) -> Self {
        Self { ranges, weights }
    }

    pub fn ranges(&self) -> &[Range; INDICATOR_COUNT] {
        &self.ranges
    }

    pub fn weights(&self) -> &[f64; INDICATOR_COUNT] {
        &self.weights
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// All weights are zero; every row of the stratum scores 0.
    pub fn is_degenerate(&self) -> bool {
        self.weights.iter().all(|w| *w == 0.0)
    }
}

/// Learned parameters for every stratum seen in training. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    indicators: Vec<IndicatorSpec>,
    strata: BTreeMap<StrataId, StratumParams>,
}

impl Model {
    pub fn new(indicators: Vec<IndicatorSpec>, strata: BTreeMap<StrataId, StratumParams>) -> Self {
        Self { indicators, strata }
    }

    /// Indicators and the signs they were trained with, in the order of each
    /// stratum's arrays.
    pub fn indicators(&self) -> &[IndicatorSpec] {
        &self.indicators
    }

    pub fn get(&self, strata_id: &StrataId) -> Option<&StratumParams> {
        self.strata.get(strata_id)
    }

    pub fn contains(&self, strata_id: &StrataId) -> bool {
        self.strata.contains_key(strata_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StrataId, &StratumParams)> {
        self.strata.iter()
    }

    pub fn len(&self) -> usize {
        self.strata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strata.is_empty()
    }

    pub fn degenerate_strata(&self) -> Vec<&StrataId> {
        self.strata
            .iter()
            .filter(|(_, p)| p.is_degenerate())
            .map(|(id, _)| id)
            .collect()
    }
}
