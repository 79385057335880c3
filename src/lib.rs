//! Decoder for Vainglory `.vgr` replay frames: player directory, kill/death/credit
//! records, per-player statistics, team labels and gold estimation.

pub mod batch;
pub mod confidence;
pub mod directory;
pub mod entity;
pub mod error;
pub mod events;
pub mod frames;
pub mod gold;
pub mod match_info;
pub mod pipeline;
pub mod report;
pub mod scanner;
pub mod settings;
pub mod stats;
pub mod team_label;
pub mod truth;

#[cfg(test)]
mod test_support;

use tracing_subscriber::EnvFilter;

pub use batch::{decode_replays, BatchProgress, ReplayJob, ReplayOutcome};
pub use confidence::{Confidence, ConfidenceLevel, FactSource};
pub use directory::{build_directory, EntityDirectory, PlayerBlockRejection};
pub use entity::{Entity, EntityId, EntityRole, Side, TeamGroup};
pub use error::{ReplayError, Result};
pub use events::{classify_events, ClassifiedEvents, DecodeWarning, EventRecord, RecordFamily};
pub use frames::{assemble_frames, read_frame_sources, AssembledReplay, ByteStream, FrameSource};
pub use gold::{select_model, CreditLedger, GoldEstimate, GoldModel, GoldModelRegistry, TrainingReplay};
pub use match_info::{GameMap, MatchInfo};
pub use pipeline::{decode_replay, DecodeContext, ReplayAnalysis, ReplayDecoder};
pub use report::MatchReport;
pub use settings::{read_settings, DecoderSettings, GoldSettings};
pub use stats::{compute_statistics, MatchDuration, MatchStatistics, PlayerStatistics};
pub use team_label::{resolve_team_labels, TeamAssignment, TeamLabelResolution};
pub use truth::{compare_with_truth, load_ground_truth, GroundTruth, TruthComparison, TruthMatch};

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`. Calling it twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
