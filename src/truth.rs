//! Externally supplied match results used for training the gold model and
//! for offline cross-checking of decoded box scores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::entity::Side;
use crate::error::ReplayError;
use crate::gold::TrainingReplay;
use crate::pipeline::{DecodeContext, ReplayAnalysis};
use crate::stats::PlayerStatistics;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthPlayer {
    pub team: Option<String>,
    pub hero_name: Option<String>,
    pub kills: Option<u32>,
    pub deaths: Option<u32>,
    pub assists: Option<u32>,
    pub gold: Option<f64>,
    pub minion_kills: Option<u32>,
}

impl TruthPlayer {
    pub fn side(&self) -> Option<Side> {
        self.team.as_deref().and_then(Side::parse)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthMatchInfo {
    pub duration_seconds: Option<f32>,
    pub winner: Option<String>,
    pub score_left: Option<u32>,
    pub score_right: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthMatch {
    pub replay_name: Option<String>,
    pub match_info: TruthMatchInfo,
    pub players: BTreeMap<String, TruthPlayer>,
}

impl TruthMatch {
    pub fn winner(&self) -> Option<Side> {
        self.match_info.winner.as_deref().and_then(Side::parse)
    }

    pub fn duration_seconds(&self) -> Option<f32> {
        self.match_info.duration_seconds
    }

    /// Winner and duration taken from this record; no gold model.
    pub fn decode_context(&self) -> DecodeContext {
        DecodeContext {
            winner: self.winner(),
            match_duration: self.duration_seconds(),
            gold_model: None,
        }
    }

    /// Exact name, then case-insensitive, then a `TAG_` prefix on either side.
    pub fn find_player(&self, decoded_name: &str) -> Option<(&str, &TruthPlayer)> {
        if let Some((name, player)) = self.players.get_key_value(decoded_name) {
            return Some((name.as_str(), player));
        }

        let lowered = decoded_name.to_lowercase();
        self.players
            .iter()
            .find(|(name, _)| name.to_lowercase() == lowered)
            .or_else(|| {
                self.players.iter().find(|(name, _)| {
                    let truth_lowered = name.to_lowercase();
                    strip_team_tag(&truth_lowered) == Some(lowered.as_str())
                        || strip_team_tag(&lowered) == Some(truth_lowered.as_str())
                })
            })
            .map(|(name, player)| (name.as_str(), player))
    }
}

fn strip_team_tag(name: &str) -> Option<&str> {
    name.split_once('_')
        .map(|(_, rest)| rest)
        .filter(|rest| !rest.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TruthMatches {
    List(Vec<TruthMatch>),
    ByReplay(BTreeMap<String, TruthMatch>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TruthDocument {
    Collection { matches: TruthMatches },
    Single(TruthMatch),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroundTruth {
    pub matches: Vec<TruthMatch>,
}

impl GroundTruth {
    pub fn parse(raw_json: &str) -> Result<Self, ReplayError> {
        let document = serde_json::from_str::<TruthDocument>(raw_json)
            .map_err(|error| ReplayError::Truth(format!("Failed to parse ground truth: {error}")))?;

        let matches = match document {
            TruthDocument::Single(truth_match) => vec![truth_match],
            TruthDocument::Collection {
                matches: TruthMatches::List(matches),
            } => matches,
            TruthDocument::Collection {
                matches: TruthMatches::ByReplay(by_replay),
            } => by_replay
                .into_iter()
                .map(|(replay_name, mut truth_match)| {
                    truth_match.replay_name.get_or_insert(replay_name);
                    truth_match
                })
                .collect(),
        };

        Ok(Self { matches })
    }

    pub fn find(&self, replay_name: &str) -> Option<&TruthMatch> {
        self.matches
            .iter()
            .find(|truth_match| truth_match.replay_name.as_deref() == Some(replay_name))
    }
}

pub fn load_ground_truth(path: &Path) -> Result<GroundTruth, ReplayError> {
    let raw_json = std::fs::read_to_string(path).map_err(|error| ReplayError::io(path, error))?;
    let ground_truth = GroundTruth::parse(&raw_json)?;

    tracing::debug!(
        truth_path = %path.display(),
        match_count = ground_truth.matches.len(),
        "Loaded ground truth"
    );

    Ok(ground_truth)
}

/// Pairs decoded credit sums with truth gold for every matched player.
pub fn training_replay(analysis: &ReplayAnalysis, truth_match: &TruthMatch) -> TrainingReplay {
    let truth_gold = analysis
        .statistics
        .players
        .iter()
        .filter_map(|player| {
            let (_, truth_player) = truth_match.find_player(&player.name)?;
            Some((player.entity_id, truth_player.gold?))
        })
        .collect::<BTreeMap<_, _>>();

    if truth_gold.len() < analysis.statistics.players.len() {
        tracing::warn!(
            replay = %analysis.replay_name,
            matched = truth_gold.len(),
            players = analysis.statistics.players.len(),
            "Not every player has truth gold"
        );
    }

    TrainingReplay {
        replay_name: analysis.replay_name.clone(),
        ledger: analysis.ledger.clone(),
        truth_gold,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldComparison {
    pub decoded: Option<f64>,
    pub truth: Option<f64>,
}

impl FieldComparison {
    fn new(decoded: Option<f64>, truth: Option<f64>) -> Self {
        Self { decoded, truth }
    }

    pub fn is_match(&self, tolerance: f64) -> Option<bool> {
        match (self.decoded, self.truth) {
            (Some(decoded), Some(truth)) => Some((decoded - truth).abs() <= tolerance),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerComparison {
    pub name: String,
    pub truth_name: Option<String>,
    pub kills: FieldComparison,
    pub deaths: FieldComparison,
    pub assists: FieldComparison,
    pub gold: FieldComparison,
    pub side_matches: Option<bool>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAccuracy {
    pub correct: usize,
    pub compared: usize,
}

impl FieldAccuracy {
    fn tally(&mut self, outcome: Option<bool>) {
        if let Some(is_match) = outcome {
            self.compared += 1;
            if is_match {
                self.correct += 1;
            }
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        (self.compared > 0).then(|| self.correct as f64 / self.compared as f64)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TruthComparison {
    pub replay_name: String,
    pub players: Vec<PlayerComparison>,
    pub unmatched_players: Vec<String>,
    pub kills: FieldAccuracy,
    pub deaths: FieldAccuracy,
    pub assists: FieldAccuracy,
    pub gold: FieldAccuracy,
    pub sides: FieldAccuracy,
}

fn compare_player(
    player: &PlayerStatistics,
    analysis: &ReplayAnalysis,
    truth_name: Option<&str>,
    truth_player: Option<&TruthPlayer>,
) -> PlayerComparison {
    let decoded_side = analysis.team_labels.side_of(player.team);
    PlayerComparison {
        name: player.name.clone(),
        truth_name: truth_name.map(str::to_string),
        kills: FieldComparison::new(
            Some(f64::from(player.kills)),
            truth_player.and_then(|truth| truth.kills).map(f64::from),
        ),
        deaths: FieldComparison::new(
            Some(f64::from(player.deaths)),
            truth_player.and_then(|truth| truth.deaths).map(f64::from),
        ),
        assists: FieldComparison::new(
            Some(f64::from(player.assists)),
            truth_player.and_then(|truth| truth.assists).map(f64::from),
        ),
        gold: FieldComparison::new(
            player.gold.as_ref().map(|estimate| estimate.value),
            truth_player.and_then(|truth| truth.gold),
        ),
        side_matches: decoded_side
            .zip(truth_player.and_then(TruthPlayer::side))
            .map(|(decoded, truth)| decoded == truth),
    }
}

/// Cross-checks a decoded replay against its truth record. Gold counts as a
/// match within `gold_tolerance`; counts must match exactly.
pub fn compare_with_truth(
    analysis: &ReplayAnalysis,
    truth_match: &TruthMatch,
    gold_tolerance: f64,
) -> TruthComparison {
    let mut comparison = TruthComparison {
        replay_name: analysis.replay_name.clone(),
        players: Vec::new(),
        unmatched_players: Vec::new(),
        kills: FieldAccuracy::default(),
        deaths: FieldAccuracy::default(),
        assists: FieldAccuracy::default(),
        gold: FieldAccuracy::default(),
        sides: FieldAccuracy::default(),
    };

    for player in &analysis.statistics.players {
        let found = truth_match.find_player(&player.name);
        if found.is_none() {
            comparison.unmatched_players.push(player.name.clone());
        }

        let player_comparison = compare_player(
            player,
            analysis,
            found.map(|(name, _)| name),
            found.map(|(_, truth)| truth),
        );

        comparison.kills.tally(player_comparison.kills.is_match(0.0));
        comparison.deaths.tally(player_comparison.deaths.is_match(0.0));
        comparison.assists.tally(player_comparison.assists.is_match(0.0));
        comparison
            .gold
            .tally(player_comparison.gold.is_match(gold_tolerance));
        comparison.sides.tally(player_comparison.side_matches);
        comparison.players.push(player_comparison);
    }

    tracing::info!(
        replay = %comparison.replay_name,
        kills_correct = comparison.kills.correct,
        deaths_correct = comparison.deaths.correct,
        assists_correct = comparison.assists.correct,
        compared = comparison.kills.compared,
        "Compared decoded statistics with ground truth"
    );

    comparison
}
