//! Indicator pre-processing that happens before values enter the indicator
//! table. Nothing here runs inside the entropy engine.

/// Caps seasonal rainfall at a multiple of the historical normal, so an
/// extreme wet season does not read as an extreme healthy one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainfallCap {
    ratio: f64,
}

impl Default for RainfallCap {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RATIO)
    }
}

impl RainfallCap {
    pub const DEFAULT_RATIO: f64 = 1.5;

    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Mean of the prior seasons' totals, ignoring non-finite entries.
    pub fn normal(history: &[f64]) -> Option<f64> {
        let finite: Vec<f64> = history.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            None
        } else {
            Some(finite.iter().sum::<f64>() / finite.len() as f64)
        }
    }

    /// `min(current, ratio * normal)`.
    pub fn apply(&self, current: f64, normal: f64) -> f64 {
        current.min(self.ratio * normal)
    }

    /// Cap against the normal of `history`; uncapped when there is no history.
    pub fn adjust(&self, current: f64, history: &[f64]) -> f64 {
        match Self::normal(history) {
            Some(normal) => self.apply(current, normal),
            None => current,
        }
    }
}
