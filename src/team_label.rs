//! Maps the raw team-grouping bytes to left/right sides.

use serde::Serialize;

use crate::confidence::{Confidence, ConfidenceLevel};
use crate::directory::EntityDirectory;
use crate::entity::{Side, TeamGroup};
use crate::settings::DecoderSettings;
use crate::stats::TeamCounts;

const BASE_LABEL_CONFIDENCE: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelEvidence {
    KillAsymmetry,
    DeathTiebreak,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAssignment {
    pub winning_team: TeamGroup,
    pub winner: Side,
    pub evidence: LabelEvidence,
    pub confidence: Confidence,
}

impl TeamAssignment {
    pub fn side_of(&self, team: TeamGroup) -> Side {
        if team == self.winning_team {
            self.winner
        } else {
            self.winner.opposite()
        }
    }

    pub fn team_on(&self, side: Side) -> TeamGroup {
        if side == self.winner {
            self.winning_team
        } else {
            self.winning_team.other()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UndeterminedReason {
    AmbiguousTeamLabel,
    MissingWinnerSignal,
    MissingTeamGroup,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum TeamLabelResolution {
    Resolved(TeamAssignment),
    Undetermined { reason: UndeterminedReason },
}

impl TeamLabelResolution {
    pub fn assignment(&self) -> Option<&TeamAssignment> {
        match self {
            TeamLabelResolution::Resolved(assignment) => Some(assignment),
            TeamLabelResolution::Undetermined { .. } => None,
        }
    }

    pub fn side_of(&self, team: TeamGroup) -> Option<Side> {
        self.assignment().map(|assignment| assignment.side_of(team))
    }
}

fn winning_team(counts: &TeamCounts) -> Option<(TeamGroup, LabelEvidence)> {
    let one = counts.team_one;
    let two = counts.team_two;

    if one.kills != two.kills {
        let team = if one.kills > two.kills {
            TeamGroup::ONE
        } else {
            TeamGroup::TWO
        };
        return Some((team, LabelEvidence::KillAsymmetry));
    }

    if one.deaths != two.deaths {
        let team = if one.deaths < two.deaths {
            TeamGroup::ONE
        } else {
            TeamGroup::TWO
        };
        return Some((team, LabelEvidence::DeathTiebreak));
    }

    None
}

fn label_confidence(
    counts: &TeamCounts,
    evidence: LabelEvidence,
    settings: &DecoderSettings,
) -> Confidence {
    let total_kills = counts.total_kills();
    let margin = counts.team_one.kills.abs_diff(counts.team_two.kills);
    let margin_ratio = if total_kills == 0 {
        0.0
    } else {
        f64::from(margin) / f64::from(total_kills)
    };

    let mut confidence = Confidence::inferred(
        BASE_LABEL_CONFIDENCE + (1.0 - BASE_LABEL_CONFIDENCE) * margin_ratio,
    );
    if evidence == LabelEvidence::DeathTiebreak {
        confidence = confidence.capped_at(ConfidenceLevel::Medium);
    }
    if total_kills < settings.min_reliable_kills {
        confidence = confidence.capped_at(ConfidenceLevel::Low);
    }
    confidence
}

/// The byte with strictly more kills wins, then the byte with strictly fewer
/// deaths. The winning byte takes the winner side.
pub fn resolve_team_labels(
    counts: &TeamCounts,
    winner: Option<Side>,
    settings: &DecoderSettings,
) -> TeamLabelResolution {
    let Some(winner) = winner else {
        return TeamLabelResolution::Undetermined {
            reason: UndeterminedReason::MissingWinnerSignal,
        };
    };

    let Some((winning_team, evidence)) = winning_team(counts) else {
        tracing::info!(
            team_one_kills = counts.team_one.kills,
            team_one_deaths = counts.team_one.deaths,
            "Kill and death totals tie, team labels left undetermined"
        );
        return TeamLabelResolution::Undetermined {
            reason: UndeterminedReason::AmbiguousTeamLabel,
        };
    };

    TeamLabelResolution::Resolved(TeamAssignment {
        winning_team,
        winner,
        evidence,
        confidence: label_confidence(counts, evidence, settings),
    })
}

/// Like [`resolve_team_labels`], but undetermined when either team byte has
/// no players in the directory.
pub fn resolve_for_directory(
    directory: &EntityDirectory,
    counts: &TeamCounts,
    winner: Option<Side>,
    settings: &DecoderSettings,
) -> TeamLabelResolution {
    let has_both_teams = [TeamGroup::ONE, TeamGroup::TWO]
        .into_iter()
        .all(|team| directory.members_of(team).next().is_some());
    if !has_both_teams {
        return TeamLabelResolution::Undetermined {
            reason: UndeterminedReason::MissingTeamGroup,
        };
    }

    resolve_team_labels(counts, winner, settings)
}
