use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

use crate::error::ReplayError;

pub(crate) const DEFAULT_CREDIT_WINDOW_BYTES: usize = 500;
pub(crate) const DEFAULT_MAX_TIMESTAMP_SECONDS: f32 = 1800.0;
pub(crate) const DEFAULT_MAX_CREDIT_VALUE: f32 = 10_000.0;

/// Tunables for one decoding run. Every field has a default taken from what
/// was observed across tournament replays, so an empty JSON object is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DecoderSettings {
    /// Upper bound on how far past a kill record credit records are still
    /// attributed to that kill. Empirical, not a protocol constant.
    pub credit_window_bytes: usize,
    pub participation_tolerance: f32,
    pub max_credit_value: f32,
    pub max_timestamp_seconds: f32,
    pub strict_death_timestamps: bool,
    pub death_buffer_seconds: f32,
    pub kill_death_pair_max_dt: f32,
    pub min_reliable_kills: u32,
    pub parallel_family_scan: bool,
    pub gold: GoldSettings,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            credit_window_bytes: DEFAULT_CREDIT_WINDOW_BYTES,
            participation_tolerance: 0.01,
            max_credit_value: DEFAULT_MAX_CREDIT_VALUE,
            max_timestamp_seconds: DEFAULT_MAX_TIMESTAMP_SECONDS,
            strict_death_timestamps: false,
            death_buffer_seconds: 10.0,
            kill_death_pair_max_dt: 5.0,
            min_reliable_kills: 5,
            parallel_family_scan: false,
            gold: GoldSettings::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GoldSettings {
    /// Absolute error (currency units) under which an estimate counts as a hit.
    pub tolerance: f64,
    pub min_training_samples: usize,
    pub candidate_actions: Vec<u8>,
    pub max_combination_size: usize,
    /// Estimates are rounded to a multiple of this before use; 0 disables rounding.
    pub estimate_rounding: f64,
}

impl Default for GoldSettings {
    fn default() -> Self {
        Self {
            tolerance: 200.0,
            min_training_samples: 6,
            candidate_actions: vec![0x02, 0x03, 0x04, 0x05, 0x06, 0x08],
            max_combination_size: 3,
            estimate_rounding: 100.0,
        }
    }
}

impl DecoderSettings {
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.max_timestamp_seconds <= 0.0 {
            return Err(ReplayError::Settings(
                "maxTimestampSeconds must be positive".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.participation_tolerance) {
            return Err(ReplayError::Settings(format!(
                "participationTolerance must be in [0, 1), got {}",
                self.participation_tolerance
            )));
        }

        if self.gold.tolerance < 0.0 {
            return Err(ReplayError::Settings(
                "gold.tolerance must not be negative".to_string(),
            ));
        }

        if self.gold.max_combination_size == 0 || self.gold.candidate_actions.is_empty() {
            return Err(ReplayError::Settings(
                "gold model search needs at least one candidate action".to_string(),
            ));
        }

        Ok(())
    }

    pub(crate) fn is_valid_timestamp(&self, seconds: f32) -> bool {
        seconds > 0.0 && seconds < self.max_timestamp_seconds
    }
}

/// Reads settings from a JSON file. A missing file yields the defaults.
pub fn read_settings(path: &Path) -> Result<DecoderSettings, ReplayError> {
    let raw_json = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            tracing::debug!(
                settings_path = %path.display(),
                "Settings file not found, using defaults"
            );
            return Ok(DecoderSettings::default());
        }
        Err(error) => return Err(ReplayError::io(path, error)),
    };

    let settings = serde_json::from_str::<DecoderSettings>(&raw_json).map_err(|error| {
        ReplayError::Settings(format!(
            "Failed to parse settings '{}': {error}",
            path.display()
        ))
    })?;

    settings.validate()?;
    Ok(settings)
}
