//! Folds classified records into per-player box scores.

use serde::Serialize;
use std::collections::HashMap;

use crate::confidence::Confidence;
use crate::directory::EntityDirectory;
use crate::entity::{EntityId, TeamGroup};
use crate::events::signatures::KILL_LAYOUT;
use crate::events::{ClassifiedEvents, RecordHeader};
use crate::gold::GoldEstimate;
use crate::settings::DecoderSettings;

const PARTICIPATION_VALUE: f32 = 1.0;

/// One kill plus the teammates credited with an assist on it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KillAttribution {
    pub killer: EntityId,
    pub offset: usize,
    pub frame_index: usize,
    pub timestamp: Option<f32>,
    pub assisters: Vec<EntityId>,
}

/// A kill paired with the death it most likely caused.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KillFeedEntry {
    pub killer: EntityId,
    pub victim: Option<EntityId>,
    pub kill_timestamp: f32,
    pub death_timestamp: Option<f32>,
    pub frame_index: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamTally {
    pub kills: u32,
    pub deaths: u32,
}

/// Kill and death totals per raw team byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCounts {
    pub team_one: TeamTally,
    pub team_two: TeamTally,
}

impl TeamCounts {
    pub fn new(team_one: TeamTally, team_two: TeamTally) -> Self {
        Self { team_one, team_two }
    }

    pub fn get(&self, team: TeamGroup) -> TeamTally {
        if team == TeamGroup::ONE {
            self.team_one
        } else {
            self.team_two
        }
    }

    fn get_mut(&mut self, team: TeamGroup) -> &mut TeamTally {
        if team == TeamGroup::ONE {
            &mut self.team_one
        } else {
            &mut self.team_two
        }
    }

    pub fn total_kills(&self) -> u32 {
        self.team_one.kills + self.team_two.kills
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatistics {
    pub entity_id: EntityId,
    pub name: String,
    pub team: TeamGroup,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    /// Kills, deaths and assists are counted from validated records.
    pub counts_confidence: Confidence,
    pub gold: Option<GoldEstimate>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStatistics {
    /// Directory order.
    pub players: Vec<PlayerStatistics>,
    pub team_counts: TeamCounts,
    pub attributions: Vec<KillAttribution>,
    pub kill_feed: Vec<KillFeedEntry>,
    pub post_game_deaths_discarded: usize,
}

impl MatchStatistics {
    pub fn player(&self, name: &str) -> Option<&PlayerStatistics> {
        self.players.iter().find(|player| player.name == name)
    }

    pub fn player_by_id(&self, entity_id: EntityId) -> Option<&PlayerStatistics> {
        self.players
            .iter()
            .find(|player| player.entity_id == entity_id)
    }

    pub fn total_kills(&self) -> u32 {
        self.players.iter().map(|player| player.kills).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DurationSource {
    Supplied,
    LastDeath,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDuration {
    pub seconds: f32,
    pub source: DurationSource,
}

/// The supplied duration, or else the latest timed death as a lower bound.
pub fn estimate_match_duration(
    events: &ClassifiedEvents,
    supplied: Option<f32>,
) -> Option<MatchDuration> {
    if let Some(seconds) = supplied {
        return Some(MatchDuration {
            seconds,
            source: DurationSource::Supplied,
        });
    }

    events
        .deaths()
        .filter_map(|death| death.timestamp)
        .reduce(f32::max)
        .map(|seconds| MatchDuration {
            seconds,
            source: DurationSource::LastDeath,
        })
}

fn is_participation_credit(value: f32, settings: &DecoderSettings) -> bool {
    (value - PARTICIPATION_VALUE).abs() < settings.participation_tolerance
}

/// Credits each kill's teammates with an assist. The credit window of a kill
/// ends at the next kill record in the stream, whoever made it, or
/// `credit_window_bytes` past the end of the kill record, whichever comes
/// first.
pub fn attribute_assists(
    events: &ClassifiedEvents,
    directory: &EntityDirectory,
    settings: &DecoderSettings,
) -> Vec<KillAttribution> {
    let boundaries = events.kill_boundaries();
    let credits = events.credits().collect::<Vec<(&RecordHeader, f32, u8)>>();

    events
        .kills()
        .map(|kill| {
            let window_cap = kill
                .offset
                .saturating_add(KILL_LAYOUT.record_len)
                .saturating_add(settings.credit_window_bytes);
            let next_boundary = boundaries.partition_point(|offset| *offset <= kill.offset);
            let window_end = boundaries
                .get(next_boundary)
                .map_or(window_cap, |next_kill| (*next_kill).min(window_cap));
            let killer_team = directory.team_of(kill.entity_id);

            let first_credit = credits.partition_point(|(header, _, _)| header.offset <= kill.offset);
            let mut assisters = Vec::new();
            for (header, value, _) in &credits[first_credit..] {
                if header.offset >= window_end {
                    break;
                }
                if header.entity_id == kill.entity_id
                    || !is_participation_credit(*value, settings)
                    || assisters.contains(&header.entity_id)
                {
                    continue;
                }
                let same_team = killer_team.is_some()
                    && directory.team_of(header.entity_id) == killer_team;
                if same_team {
                    assisters.push(header.entity_id);
                }
            }

            KillAttribution {
                killer: kill.entity_id,
                offset: kill.offset,
                frame_index: kill.frame_index,
                timestamp: kill.timestamp,
                assisters,
            }
        })
        .collect()
}

/// Cutoff past which deaths belong to the post-game ceremony.
pub fn post_game_cutoff(match_duration: Option<f32>, settings: &DecoderSettings) -> Option<f32> {
    match_duration.map(|duration| duration + settings.death_buffer_seconds)
}

/// Splits deaths into counted and post-game. Deaths without a timestamp are
/// always counted.
pub fn filter_post_game_deaths<'a>(
    deaths: impl Iterator<Item = &'a RecordHeader>,
    cutoff: Option<f32>,
) -> (Vec<&'a RecordHeader>, usize) {
    let mut kept = Vec::new();
    let mut discarded = 0;
    for death in deaths {
        let is_post_game = matches!(
            (death.timestamp, cutoff),
            (Some(timestamp), Some(cutoff)) if timestamp > cutoff
        );
        if is_post_game {
            discarded += 1;
        } else {
            kept.push(death);
        }
    }
    (kept, discarded)
}

/// Greedily pairs each timed kill with the closest unused death of a player
/// on the other raw team within `kill_death_pair_max_dt` seconds.
pub fn build_kill_feed(
    kills: &[&RecordHeader],
    deaths: &[&RecordHeader],
    directory: &EntityDirectory,
    settings: &DecoderSettings,
) -> Vec<KillFeedEntry> {
    let mut timed_kills = kills
        .iter()
        .filter_map(|kill| kill.timestamp.map(|timestamp| (timestamp, *kill)))
        .collect::<Vec<(f32, &RecordHeader)>>();
    timed_kills.sort_by(|left, right| left.0.total_cmp(&right.0));

    let mut timed_deaths = deaths
        .iter()
        .filter_map(|death| death.timestamp.map(|timestamp| (timestamp, *death)))
        .collect::<Vec<(f32, &RecordHeader)>>();
    timed_deaths.sort_by(|left, right| left.0.total_cmp(&right.0));

    let mut used = vec![false; timed_deaths.len()];

    timed_kills
        .into_iter()
        .map(|(kill_timestamp, kill)| {
            let killer_team = directory.team_of(kill.entity_id);
            let mut best: Option<(usize, f32)> = None;

            for (position, (death_timestamp, death)) in timed_deaths.iter().enumerate() {
                if used[position] {
                    continue;
                }
                let Some(victim_team) = directory.team_of(death.entity_id) else {
                    continue;
                };
                if Some(victim_team) == killer_team {
                    continue;
                }
                let delta = (kill_timestamp - death_timestamp).abs();
                let best_delta = best.map_or(settings.kill_death_pair_max_dt, |(_, delta)| delta);
                if delta < best_delta {
                    best = Some((position, delta));
                }
            }

            let victim = best.map(|(position, _)| {
                used[position] = true;
                timed_deaths[position]
            });

            KillFeedEntry {
                killer: kill.entity_id,
                victim: victim.map(|(_, death)| death.entity_id),
                kill_timestamp,
                death_timestamp: victim.map(|(timestamp, _)| timestamp),
                frame_index: kill.frame_index,
            }
        })
        .collect()
}

/// Builds the box score for every player in the directory.
pub fn compute_statistics(
    events: &ClassifiedEvents,
    directory: &EntityDirectory,
    settings: &DecoderSettings,
    match_duration: Option<f32>,
) -> MatchStatistics {
    let attributions = attribute_assists(events, directory, settings);
    let kills = events.kills().collect::<Vec<&RecordHeader>>();
    let cutoff = post_game_cutoff(match_duration, settings);
    let (deaths, post_game_deaths_discarded) = filter_post_game_deaths(events.deaths(), cutoff);

    if post_game_deaths_discarded > 0 {
        tracing::info!(
            discarded = post_game_deaths_discarded,
            cutoff_seconds = cutoff.unwrap_or_default(),
            "Discarded post-game deaths"
        );
    }

    let mut kill_totals: HashMap<EntityId, u32> = HashMap::new();
    let mut death_totals: HashMap<EntityId, u32> = HashMap::new();
    let mut assist_totals: HashMap<EntityId, u32> = HashMap::new();

    for kill in &kills {
        *kill_totals.entry(kill.entity_id).or_default() += 1;
    }
    for death in &deaths {
        *death_totals.entry(death.entity_id).or_default() += 1;
    }
    for assister in attributions.iter().flat_map(|attribution| &attribution.assisters) {
        *assist_totals.entry(*assister).or_default() += 1;
    }

    let mut team_counts = TeamCounts::default();
    let players = directory
        .entities()
        .iter()
        .map(|entity| {
            let player = PlayerStatistics {
                entity_id: entity.id,
                name: entity.name.clone(),
                team: entity.team,
                kills: kill_totals.get(&entity.id).copied().unwrap_or(0),
                deaths: death_totals.get(&entity.id).copied().unwrap_or(0),
                assists: assist_totals.get(&entity.id).copied().unwrap_or(0),
                counts_confidence: Confidence::decoded(),
                gold: None,
            };
            let tally = team_counts.get_mut(entity.team);
            tally.kills += player.kills;
            tally.deaths += player.deaths;
            player
        })
        .collect();

    let kill_feed = build_kill_feed(&kills, &deaths, directory, settings);

    MatchStatistics {
        players,
        team_counts,
        attributions,
        kill_feed,
        post_game_deaths_discarded,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        compute_statistics, estimate_match_duration, DurationSource, MatchDuration,
        MatchStatistics,
    };
    use crate::directory::{build_directory, EntityDirectory};
    use crate::entity::EntityId;
    use crate::events::{classify_events, ClassifiedEvents};
    use crate::frames::assemble_frames;
    use crate::settings::DecoderSettings;
    use crate::test_support::{
        credit_record, death_record, filler, kill_record, player_block, player_id,
        synthetic_replay,
    };

    // alpha, bravo on team 1; charlie, delta on team 2.
    fn events_for(event_frames: &[Vec<u8>], settings: &DecoderSettings) -> ClassifiedEvents {
        let (events, _) = decode_events(event_frames, settings);
        events
    }

    fn statistics_for(
        event_frames: &[Vec<u8>],
        settings: &DecoderSettings,
        match_duration: Option<f32>,
    ) -> MatchStatistics {
        let (events, directory) = decode_events(event_frames, settings);
        compute_statistics(&events, &directory, settings, match_duration)
    }

    fn decode_events(
        event_frames: &[Vec<u8>],
        settings: &DecoderSettings,
    ) -> (ClassifiedEvents, EntityDirectory) {
        let sources = synthetic_replay(
            "stats",
            &[
                player_block("alpha", player_id(0), 1),
                player_block("bravo", player_id(1), 1),
                player_block("charlie", player_id(2), 2),
                player_block("delta", player_id(3), 2),
            ],
            event_frames,
        );
        let assembled = assemble_frames("stats", sources).expect("Expected frames");
        let first_frame = assembled.first_frame().expect("Expected a first frame");
        let build = build_directory(&first_frame.bytes).expect("Expected players");
        let events = classify_events(&assembled.stream, &build.directory, settings);
        (events, build.directory)
    }

    #[test]
    fn cross_team_participation_credit_is_not_an_assist() {
        let mut frame = filler(4);
        frame.extend(kill_record(player_id(0), 60.0));
        frame.extend(credit_record(player_id(1), 1.0, 0x06));
        frame.extend(credit_record(player_id(2), 1.0, 0x06));
        frame.extend(credit_record(player_id(1), 1.0, 0x0E));

        let statistics = statistics_for(&[frame], &DecoderSettings::default(), None);

        assert_eq!(statistics.player("bravo").map(|player| player.assists), Some(1));
        assert_eq!(statistics.player("charlie").map(|player| player.assists), Some(0));
        assert_eq!(statistics.attributions[0].assisters, vec![player_id(1)]);
    }

    #[test]
    fn killer_and_non_participation_values_earn_nothing() {
        let mut frame = filler(4);
        frame.extend(kill_record(player_id(0), 60.0));
        frame.extend(credit_record(player_id(0), 1.0, 0x06));
        frame.extend(credit_record(player_id(1), 1.2, 0x06));
        frame.extend(credit_record(player_id(1), 0.995, 0x0E));

        let statistics = statistics_for(&[frame], &DecoderSettings::default(), None);

        assert_eq!(statistics.player("alpha").map(|player| player.assists), Some(0));
        assert_eq!(statistics.player("bravo").map(|player| player.assists), Some(1));
    }

    #[test]
    fn credit_window_stops_at_next_kill_and_byte_cap() {
        let mut frame = filler(4);
        frame.extend(kill_record(player_id(0), 60.0));
        frame.extend(kill_record(player_id(2), 61.0));
        frame.extend(credit_record(player_id(1), 1.0, 0x06));
        frame.extend(credit_record(player_id(3), 1.0, 0x06));

        let statistics = statistics_for(&[frame.clone()], &DecoderSettings::default(), None);
        assert_eq!(statistics.player("bravo").map(|player| player.assists), Some(0));
        assert_eq!(statistics.player("delta").map(|player| player.assists), Some(1));

        let mut spaced = filler(4);
        spaced.extend(kill_record(player_id(0), 60.0));
        spaced.extend(filler(40));
        spaced.extend(credit_record(player_id(1), 1.0, 0x06));
        let narrow = DecoderSettings {
            credit_window_bytes: 32,
            ..DecoderSettings::default()
        };
        let statistics = statistics_for(&[spaced.clone()], &narrow, None);
        assert_eq!(statistics.player("bravo").map(|player| player.assists), Some(0));

        let statistics = statistics_for(&[spaced], &DecoderSettings::default(), None);
        assert_eq!(statistics.player("bravo").map(|player| player.assists), Some(1));
    }

    #[test]
    fn kill_outside_the_directory_closes_the_credit_window() {
        let outsider = EntityId::from_be_value(0xEA60);
        let mut frame = filler(4);
        frame.extend(kill_record(player_id(0), 60.0));
        frame.extend(kill_record(outsider, 61.0));
        frame.extend(credit_record(player_id(1), 1.0, 0x06));

        let statistics = statistics_for(&[frame], &DecoderSettings::default(), None);

        assert_eq!(statistics.player("alpha").map(|player| player.kills), Some(1));
        assert_eq!(statistics.player("bravo").map(|player| player.assists), Some(0));
        assert!(statistics.attributions[0].assisters.is_empty());
    }

    #[test]
    fn byte_cap_is_measured_from_the_end_of_the_kill_record() {
        let mut frame = filler(4);
        frame.extend(kill_record(player_id(0), 60.0));
        frame.extend(filler(20));
        frame.extend(credit_record(player_id(1), 1.0, 0x06));
        let settings = DecoderSettings {
            credit_window_bytes: 24,
            ..DecoderSettings::default()
        };

        let statistics = statistics_for(&[frame], &settings, None);

        assert_eq!(statistics.player("bravo").map(|player| player.assists), Some(1));
    }

    #[test]
    fn post_game_deaths_are_dropped_when_duration_is_known() {
        let mut frame = filler(4);
        frame.extend(death_record(player_id(2), 100.0));
        frame.extend(death_record(player_id(2), 905.0));
        frame.extend(death_record(player_id(3), 925.0));

        let without_duration = statistics_for(&[frame.clone()], &DecoderSettings::default(), None);
        assert_eq!(without_duration.team_counts.team_two.deaths, 3);

        let with_duration = statistics_for(&[frame], &DecoderSettings::default(), Some(900.0));
        assert_eq!(with_duration.player("charlie").map(|player| player.deaths), Some(2));
        assert_eq!(with_duration.player("delta").map(|player| player.deaths), Some(0));
        assert_eq!(with_duration.post_game_deaths_discarded, 1);
    }

    #[test]
    fn duration_falls_back_to_the_latest_timed_death() {
        let mut frame = filler(4);
        frame.extend(death_record(player_id(2), 300.0));
        frame.extend(death_record(player_id(3), 1250.5));
        frame.extend(death_record(player_id(0), 4000.0));
        let settings = DecoderSettings::default();
        let events = events_for(&[frame], &settings);

        assert_eq!(
            estimate_match_duration(&events, None),
            Some(MatchDuration {
                seconds: 1250.5,
                source: DurationSource::LastDeath,
            })
        );
        assert_eq!(
            estimate_match_duration(&events, Some(1400.0)).map(|duration| duration.source),
            Some(DurationSource::Supplied)
        );
        assert_eq!(estimate_match_duration(&events_for(&[filler(8)], &settings), None), None);
    }

    #[test]
    fn kill_feed_pairs_kills_with_enemy_deaths() {
        let mut frame = filler(4);
        frame.extend(kill_record(player_id(0), 200.0));
        frame.extend(death_record(player_id(1), 200.5));
        frame.extend(death_record(player_id(2), 201.0));
        frame.extend(kill_record(player_id(3), 500.0));
        frame.extend(death_record(player_id(0), 510.0));

        let statistics = statistics_for(&[frame], &DecoderSettings::default(), None);

        assert_eq!(statistics.kill_feed.len(), 2);
        assert_eq!(statistics.kill_feed[0].victim, Some(player_id(2)));
        assert_eq!(statistics.kill_feed[0].death_timestamp, Some(201.0));
        assert_eq!(statistics.kill_feed[1].victim, None);
    }

    #[test]
    fn team_counts_sum_player_totals() {
        let mut frame = filler(4);
        frame.extend(kill_record(player_id(0), 10.0));
        frame.extend(kill_record(player_id(1), 20.0));
        frame.extend(kill_record(player_id(2), 30.0));
        frame.extend(death_record(player_id(3), 11.0));

        let statistics = statistics_for(&[frame], &DecoderSettings::default(), None);

        assert_eq!(statistics.team_counts.team_one.kills, 2);
        assert_eq!(statistics.team_counts.team_two.kills, 1);
        assert_eq!(statistics.team_counts.team_two.deaths, 1);
        assert_eq!(statistics.total_kills(), 3);
    }
}
