use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::confidence::Confidence;
use crate::directory::PlayerBlockRejection;
use crate::entity::{EntityId, Side};
use crate::events::{DecodeWarning, FamilyCounts};
use crate::match_info::MatchInfo;
use crate::pipeline::ReplayAnalysis;
use crate::stats::MatchDuration;
use crate::team_label::TeamLabelResolution;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerReportRow {
    pub name: String,
    pub entity_id: EntityId,
    pub team_byte: u8,
    pub side: Option<Side>,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub counts_confidence: Confidence,
    pub gold: Option<f64>,
    pub gold_cv_accuracy: Option<f64>,
    pub gold_tolerance: Option<f64>,
    pub gold_confidence: Option<Confidence>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KillFeedRow {
    pub killer: String,
    pub victim: Option<String>,
    pub kill_timestamp: f32,
    pub frame_index: usize,
}

/// Serializable summary of one decoded replay. Writing it anywhere is up to
/// the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub replay_name: String,
    pub decoded_at: DateTime<Utc>,
    pub frame_count: usize,
    pub stream_bytes: usize,
    pub match_info: MatchInfo,
    pub match_duration: Option<MatchDuration>,
    pub players: Vec<PlayerReportRow>,
    pub team_labels: TeamLabelResolution,
    pub record_counts: FamilyCounts,
    pub kill_feed: Vec<KillFeedRow>,
    pub rejected_blocks: Vec<PlayerBlockRejection>,
    pub warnings: Vec<DecodeWarning>,
}

impl MatchReport {
    pub fn from_analysis(analysis: &ReplayAnalysis) -> Self {
        Self::from_analysis_at(analysis, Utc::now())
    }

    pub fn from_analysis_at(analysis: &ReplayAnalysis, decoded_at: DateTime<Utc>) -> Self {
        let name_of = |entity_id: EntityId| {
            analysis
                .directory
                .get(entity_id)
                .map(|entity| entity.name.clone())
                .unwrap_or_else(|| entity_id.to_string())
        };

        let players = analysis
            .statistics
            .players
            .iter()
            .map(|player| PlayerReportRow {
                name: player.name.clone(),
                entity_id: player.entity_id,
                team_byte: player.team.raw(),
                side: analysis.team_labels.side_of(player.team),
                kills: player.kills,
                deaths: player.deaths,
                assists: player.assists,
                counts_confidence: player.counts_confidence,
                gold: player.gold.as_ref().map(|estimate| estimate.value),
                gold_cv_accuracy: player
                    .gold
                    .as_ref()
                    .and_then(|estimate| estimate.cv_accuracy),
                gold_tolerance: player.gold.as_ref().map(|estimate| estimate.tolerance),
                gold_confidence: player.gold.as_ref().map(|estimate| estimate.confidence),
            })
            .collect();

        let kill_feed = analysis
            .statistics
            .kill_feed
            .iter()
            .map(|entry| KillFeedRow {
                killer: name_of(entry.killer),
                victim: entry.victim.map(name_of),
                kill_timestamp: entry.kill_timestamp,
                frame_index: entry.frame_index,
            })
            .collect();

        Self {
            replay_name: analysis.replay_name.clone(),
            decoded_at,
            frame_count: analysis.frame_count,
            stream_bytes: analysis.stream_length,
            match_info: analysis.match_info.clone(),
            match_duration: analysis.match_duration,
            players,
            team_labels: analysis.team_labels,
            record_counts: analysis.events.counts(),
            kill_feed,
            rejected_blocks: analysis.rejected_blocks.clone(),
            warnings: analysis.warnings.clone(),
        }
    }
}
