use serde::{Deserialize, Serialize};

const THRESHOLD_HIGH: f64 = 0.8;
const THRESHOLD_MEDIUM: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_value(value: f64) -> Self {
        if value >= THRESHOLD_HIGH {
            ConfidenceLevel::High
        } else if value >= THRESHOLD_MEDIUM {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Where a fact came from. Decoded facts are read straight out of validated
/// records; inferred facts come from a heuristic or a fitted model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FactSource {
    Decoded,
    Inferred,
    Truth,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confidence {
    pub value: f64,
    pub level: ConfidenceLevel,
    pub source: FactSource,
}

impl Confidence {
    pub fn inferred(value: f64) -> Self {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            value,
            level: ConfidenceLevel::from_value(value),
            source: FactSource::Inferred,
        }
    }

    pub fn decoded() -> Self {
        Self {
            value: 1.0,
            level: ConfidenceLevel::High,
            source: FactSource::Decoded,
        }
    }

    /// Caps the value so the level is at most `level`.
    pub fn capped_at(self, level: ConfidenceLevel) -> Self {
        let ceiling = match level {
            ConfidenceLevel::High => 1.0,
            ConfidenceLevel::Medium => THRESHOLD_HIGH - 0.01,
            ConfidenceLevel::Low => THRESHOLD_MEDIUM - 0.01,
        };
        let value = self.value.min(ceiling);
        Self {
            value,
            level: ConfidenceLevel::from_value(value),
            source: self.source,
        }
    }

    pub fn is_inferred(&self) -> bool {
        self.source == FactSource::Inferred
    }
}
