//! One replay end to end: frames, directory, records, box score, labels, gold.

use std::path::PathBuf;

use crate::directory::{build_directory, EntityDirectory, PlayerBlockRejection};
use crate::entity::Side;
use crate::error::ReplayError;
use crate::events::{classify_events, ClassifiedEvents, DecodeWarning};
use crate::frames::{assemble_frames, read_frame_sources, FrameSource};
use crate::gold::{CreditLedger, GoldModel};
use crate::settings::DecoderSettings;
use crate::match_info::MatchInfo;
use crate::stats::{
    compute_statistics, estimate_match_duration, post_game_cutoff, MatchDuration, MatchStatistics,
};
use crate::team_label::{resolve_for_directory, TeamLabelResolution};

/// Facts about a replay that do not come from its bytes.
#[derive(Clone, Debug, Default)]
pub struct DecodeContext {
    pub winner: Option<Side>,
    pub match_duration: Option<f32>,
    pub gold_model: Option<GoldModel>,
}

impl DecodeContext {
    pub fn with_winner(mut self, winner: Side) -> Self {
        self.winner = Some(winner);
        self
    }

    pub fn with_match_duration(mut self, seconds: f32) -> Self {
        self.match_duration = Some(seconds);
        self
    }

    pub fn with_gold_model(mut self, gold_model: GoldModel) -> Self {
        self.gold_model = Some(gold_model);
        self
    }
}

#[derive(Clone, Debug)]
pub struct ReplayAnalysis {
    pub replay_name: String,
    pub frame_count: usize,
    pub stream_length: usize,
    pub match_info: MatchInfo,
    /// Supplied by the caller, or estimated from the latest timed death.
    /// Only a supplied duration drives the post-game death filter.
    pub match_duration: Option<MatchDuration>,
    pub directory: EntityDirectory,
    pub rejected_blocks: Vec<PlayerBlockRejection>,
    pub events: ClassifiedEvents,
    pub ledger: CreditLedger,
    pub statistics: MatchStatistics,
    pub team_labels: TeamLabelResolution,
    pub warnings: Vec<DecodeWarning>,
}

#[derive(Clone, Debug, Default)]
pub struct ReplayDecoder {
    settings: DecoderSettings,
}

impl ReplayDecoder {
    pub fn new(settings: DecoderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DecoderSettings {
        &self.settings
    }

    pub fn decode(
        &self,
        replay_name: &str,
        sources: Vec<FrameSource>,
        context: &DecodeContext,
    ) -> Result<ReplayAnalysis, ReplayError> {
        decode_replay(replay_name, sources, &self.settings, context)
    }

    pub fn decode_paths(
        &self,
        replay_name: &str,
        frame_paths: &[PathBuf],
        context: &DecodeContext,
    ) -> Result<ReplayAnalysis, ReplayError> {
        let sources = read_frame_sources(frame_paths)?;
        self.decode(replay_name, sources, context)
    }
}

pub fn decode_replay(
    replay_name: &str,
    sources: Vec<FrameSource>,
    settings: &DecoderSettings,
    context: &DecodeContext,
) -> Result<ReplayAnalysis, ReplayError> {
    let assembled = assemble_frames(replay_name, sources)?;
    let Some(first_frame) = assembled.first_frame() else {
        return Err(ReplayError::IncompleteReplay {
            replay: replay_name.to_string(),
        });
    };

    let directory_build = build_directory(&first_frame.bytes)?;
    let directory = directory_build.directory;
    let match_info = directory_build.match_info;

    let events = classify_events(&assembled.stream, &directory, settings);
    let ledger = CreditLedger::from_events(&events);
    let mut statistics = compute_statistics(&events, &directory, settings, context.match_duration);

    if let Some(gold_model) = &context.gold_model {
        for player in &mut statistics.players {
            player.gold = Some(gold_model.estimate(&ledger, player.entity_id));
        }
    }

    let team_labels = resolve_for_directory(
        &directory,
        &statistics.team_counts,
        context.winner,
        settings,
    );

    let match_duration = estimate_match_duration(&events, context.match_duration);

    let mut warnings = events.warnings().to_vec();
    if match_info.game_mode.is_some() && directory.len() != match_info.expected_player_count() {
        tracing::warn!(
            replay = replay_name,
            players = directory.len(),
            expected = match_info.expected_player_count(),
            "Player count does not match the game mode"
        );
        warnings.push(DecodeWarning::PlayerCountMismatch {
            players: directory.len(),
            expected: match_info.expected_player_count(),
        });
    }
    if statistics.post_game_deaths_discarded > 0 {
        if let Some(cutoff_seconds) = post_game_cutoff(context.match_duration, settings) {
            warnings.push(DecodeWarning::PostGameDeathsDiscarded {
                count: statistics.post_game_deaths_discarded,
                cutoff_seconds,
            });
        }
    }

    tracing::info!(
        replay = replay_name,
        frames = assembled.frame_count(),
        players = directory.len(),
        kills = events.counts().kills,
        deaths = events.counts().deaths,
        credits = events.counts().credits,
        "Decoded replay"
    );

    Ok(ReplayAnalysis {
        replay_name: replay_name.to_string(),
        frame_count: assembled.frame_count(),
        stream_length: assembled.stream.len(),
        match_info,
        match_duration,
        directory,
        rejected_blocks: directory_build.rejected,
        events,
        ledger,
        statistics,
        team_labels,
        warnings,
    })
}
