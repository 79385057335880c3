use std::path::PathBuf;

use crate::directory::PlayerBlockRejection;

/// Replay-level failures. Anything that only affects a single record candidate
/// is recovered where it happens and never shows up here.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("No frame sources were found for replay '{replay}'")]
    IncompleteReplay { replay: String },

    #[error("No player blocks could be extracted from the first frame ({} candidates rejected)", rejected.len())]
    NoPlayersFound { rejected: Vec<PlayerBlockRejection> },

    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid decoder settings: {0}")]
    Settings(String),

    #[error("Invalid ground truth: {0}")]
    Truth(String),

    #[error("Replay worker failed: {0}")]
    Batch(String),
}

impl ReplayError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the failures that make a replay unattributable.
    pub fn is_fatal_for_replay(&self) -> bool {
        matches!(
            self,
            ReplayError::IncompleteReplay { .. } | ReplayError::NoPlayersFound { .. }
        )
    }
}

pub type Result<T, E = ReplayError> = std::result::Result<T, E>;
