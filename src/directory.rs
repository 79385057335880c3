use serde::Serialize;
use std::collections::HashMap;

use crate::entity::{Entity, EntityId, TeamGroup};
use crate::error::ReplayError;
use crate::match_info::{read_match_info, MatchInfo};
use crate::scanner::{scan, ScanOptions, Signature};

pub(crate) const PLAYER_BLOCK_MARKERS: [Signature; 2] = [[0xDA, 0x03, 0xEE], [0xE0, 0x03, 0xEE]];

const NAME_OFFSET: usize = 3;
const MAX_NAME_LENGTH: usize = 30;
const MIN_NAME_LENGTH: usize = 3;
const ENTITY_ID_OFFSET: usize = 0xA5;
const TEAM_BYTE_OFFSET: usize = 0xD5;
const NON_PLAYER_NAME_PREFIXES: [&str; 1] = ["GameMode"];

/// A player-block candidate that did not make it into the directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum PlayerBlockRejection {
    MalformedPlayerName { offset: usize, name: String },
    TruncatedBlock { offset: usize, name: String },
    InvalidTeamByte { offset: usize, name: String, team_byte: u8 },
    DuplicateName { offset: usize, name: String },
    DuplicateEntityId { offset: usize, name: String, entity_id: EntityId },
}

impl PlayerBlockRejection {
    pub fn offset(&self) -> usize {
        match self {
            PlayerBlockRejection::MalformedPlayerName { offset, .. }
            | PlayerBlockRejection::TruncatedBlock { offset, .. }
            | PlayerBlockRejection::InvalidTeamByte { offset, .. }
            | PlayerBlockRejection::DuplicateName { offset, .. }
            | PlayerBlockRejection::DuplicateEntityId { offset, .. } => *offset,
        }
    }
}

/// Players of one replay, indexed by name, LE id and BE id.
#[derive(Clone, Debug, Default)]
pub struct EntityDirectory {
    entities: Vec<Entity>,
    by_name: HashMap<String, usize>,
    by_le_value: HashMap<u16, usize>,
    by_be_value: HashMap<u16, usize>,
}

impl EntityDirectory {
    fn insert(&mut self, entity: Entity) {
        let position = self.entities.len();
        self.by_name.insert(entity.name.clone(), position);
        self.by_le_value.insert(entity.id.le_value(), position);
        self.by_be_value.insert(entity.id.be_value(), position);
        self.entities.push(entity);
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, entity_id: EntityId) -> Option<&Entity> {
        self.by_be_value(entity_id.be_value())
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.by_be_value.contains_key(&entity_id.be_value())
    }

    pub fn by_name(&self, name: &str) -> Option<&Entity> {
        self.by_name
            .get(name)
            .and_then(|position| self.entities.get(*position))
    }

    pub fn by_le_value(&self, value: u16) -> Option<&Entity> {
        self.by_le_value
            .get(&value)
            .and_then(|position| self.entities.get(*position))
    }

    pub fn by_be_value(&self, value: u16) -> Option<&Entity> {
        self.by_be_value
            .get(&value)
            .and_then(|position| self.entities.get(*position))
    }

    pub fn team_of(&self, entity_id: EntityId) -> Option<TeamGroup> {
        self.get(entity_id).map(|entity| entity.team)
    }

    pub fn members_of(&self, team: TeamGroup) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |entity| entity.team == team)
    }
}

#[derive(Clone, Debug)]
pub struct DirectoryBuild {
    pub directory: EntityDirectory,
    pub rejected: Vec<PlayerBlockRejection>,
    pub match_info: MatchInfo,
}

fn marker_offsets(frame: &[u8]) -> Vec<usize> {
    let mut offsets = PLAYER_BLOCK_MARKERS
        .iter()
        .flat_map(|marker| scan(frame, *marker, |_, _| true, ScanOptions::default()))
        .collect::<Vec<usize>>();
    offsets.sort_unstable();
    offsets
}

fn read_player_name(frame: &[u8], marker_offset: usize) -> String {
    let name_start = marker_offset + NAME_OFFSET;
    let Some(candidate) = frame.get(name_start..) else {
        return String::new();
    };

    candidate
        .iter()
        .take(MAX_NAME_LENGTH)
        .take_while(|byte| (0x20..=0x7E).contains(*byte))
        .map(|byte| char::from(*byte))
        .collect()
}

fn is_valid_player_name(name: &str) -> bool {
    name.len() >= MIN_NAME_LENGTH
        && !NON_PLAYER_NAME_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

fn read_player_block(
    frame: &[u8],
    offset: usize,
    position: usize,
) -> Result<Entity, PlayerBlockRejection> {
    let name = read_player_name(frame, offset);
    if !is_valid_player_name(&name) {
        return Err(PlayerBlockRejection::MalformedPlayerName { offset, name });
    }

    let (Some(id_bytes), Some(team_byte)) = (
        frame.get(offset + ENTITY_ID_OFFSET..offset + ENTITY_ID_OFFSET + 2),
        frame.get(offset + TEAM_BYTE_OFFSET).copied(),
    ) else {
        return Err(PlayerBlockRejection::TruncatedBlock { offset, name });
    };

    let Some(team) = TeamGroup::from_raw(team_byte) else {
        return Err(PlayerBlockRejection::InvalidTeamByte {
            offset,
            name,
            team_byte,
        });
    };

    let id = EntityId::from_le_value(u16::from_le_bytes([id_bytes[0], id_bytes[1]]));

    Ok(Entity {
        id,
        name,
        team,
        role: id.role(),
        block_offset: offset,
        directory_position: position,
    })
}

/// Builds the player directory and match info from the first frame of a
/// replay.
pub fn build_directory(first_frame: &[u8]) -> Result<DirectoryBuild, ReplayError> {
    let mut directory = EntityDirectory::default();
    let mut rejected = Vec::new();

    for offset in marker_offsets(first_frame) {
        let entity = match read_player_block(first_frame, offset, directory.len()) {
            Ok(entity) => entity,
            Err(rejection) => {
                tracing::warn!(block_offset = offset, rejection = ?rejection, "Skipping player block");
                rejected.push(rejection);
                continue;
            }
        };

        if directory.by_name(&entity.name).is_some() {
            tracing::warn!(
                block_offset = offset,
                player_name = %entity.name,
                "Player block repeats a name, skipping"
            );
            rejected.push(PlayerBlockRejection::DuplicateName {
                offset,
                name: entity.name,
            });
            continue;
        }

        if directory.contains(entity.id) {
            tracing::warn!(
                block_offset = offset,
                entity_id = %entity.id,
                player_name = %entity.name,
                "Player block reuses an entity id, skipping"
            );
            rejected.push(PlayerBlockRejection::DuplicateEntityId {
                offset,
                name: entity.name,
                entity_id: entity.id,
            });
            continue;
        }

        directory.insert(entity);
    }

    if directory.is_empty() {
        return Err(ReplayError::NoPlayersFound { rejected });
    }

    tracing::debug!(
        player_count = directory.len(),
        rejected_count = rejected.len(),
        "Built entity directory"
    );

    Ok(DirectoryBuild {
        directory,
        rejected,
        match_info: read_match_info(first_frame),
    })
}

#[cfg(test)]
mod tests {
    use super::{build_directory, PlayerBlockRejection};
    use crate::entity::{EntityId, EntityRole, TeamGroup};
    use crate::error::ReplayError;
    use crate::test_support::{filler, player_block, player_block_with_marker, player_id};

    fn frame_from_blocks(blocks: &[Vec<u8>]) -> Vec<u8> {
        let mut frame = filler(8);
        for block in blocks {
            frame.extend_from_slice(block);
        }
        frame
    }

    #[test]
    fn extracts_players_from_both_marker_kinds() {
        let frame = frame_from_blocks(&[
            player_block("alpha", player_id(0), 1),
            player_block_with_marker([0xE0, 0x03, 0xEE], "bravo", player_id(1), 2),
        ]);

        let build = build_directory(&frame).expect("Expected two valid player blocks");
        let directory = build.directory;

        assert_eq!(directory.len(), 2);
        assert!(build.rejected.is_empty());

        let bravo = directory.by_name("bravo").expect("bravo should be indexed");
        assert_eq!(bravo.id, player_id(1));
        assert_eq!(bravo.team, TeamGroup::TWO);
        assert_eq!(bravo.role, EntityRole::Player);
        assert_eq!(bravo.directory_position, 1);

        let alpha_id = player_id(0);
        assert_eq!(
            directory.by_le_value(alpha_id.le_value()).map(|entity| entity.name.as_str()),
            Some("alpha")
        );
        assert_eq!(
            directory.by_be_value(alpha_id.be_value()).map(|entity| entity.name.as_str()),
            Some("alpha")
        );
        assert_eq!(directory.members_of(TeamGroup::ONE).count(), 1);
    }

    #[test]
    fn two_character_names_are_rejected_without_dropping_others() {
        let frame = frame_from_blocks(&[
            player_block("ab", player_id(0), 1),
            player_block("charlie", player_id(1), 1),
            player_block("GameModeSolo", player_id(2), 2),
        ]);

        let build = build_directory(&frame).expect("charlie should survive");

        assert_eq!(build.directory.len(), 1);
        assert!(build.directory.by_name("charlie").is_some());
        assert!(build.directory.by_name("ab").is_none());
        assert!(matches!(
            build.rejected.as_slice(),
            [
                PlayerBlockRejection::MalformedPlayerName { name: first, .. },
                PlayerBlockRejection::MalformedPlayerName { name: second, .. },
            ] if first == "ab" && second == "GameModeSolo"
        ));
    }

    #[test]
    fn invalid_team_byte_and_truncated_blocks_are_skipped() {
        let mut frame = frame_from_blocks(&[
            player_block("delta", player_id(0), 3),
            player_block("echo", player_id(1), 2),
        ]);
        let mut truncated = player_block("foxtrot", player_id(2), 1);
        truncated.truncate(0xC0);
        frame.extend_from_slice(&truncated);

        let build = build_directory(&frame).expect("echo should survive");

        assert_eq!(build.directory.len(), 1);
        assert!(build.rejected.iter().any(|rejection| matches!(
            rejection,
            PlayerBlockRejection::InvalidTeamByte { team_byte: 3, .. }
        )));
        assert!(build.rejected.iter().any(|rejection| matches!(
            rejection,
            PlayerBlockRejection::TruncatedBlock { name, .. } if name == "foxtrot"
        )));
    }

    #[test]
    fn first_occurrence_of_a_name_wins() {
        let frame = frame_from_blocks(&[
            player_block("golf", player_id(0), 1),
            player_block("golf", player_id(1), 2),
        ]);

        let build = build_directory(&frame).expect("Expected one player");
        let golf = build.directory.by_name("golf").expect("golf should be indexed");

        assert_eq!(golf.id, player_id(0));
        assert_eq!(build.directory.len(), 1);
        assert!(!build.directory.contains(player_id(1)));
    }

    #[test]
    fn match_info_is_read_from_the_same_frame() {
        let mut frame = frame_from_blocks(&[player_block("hotel", player_id(0), 1)]);
        frame.extend_from_slice(b"GameMode_5v5_Casual");
        frame.extend(filler(8));

        let build = build_directory(&frame).expect("Expected one player");

        assert_eq!(build.match_info.game_mode.as_deref(), Some("GameMode_5v5_Casual"));
        assert_eq!(build.match_info.team_size, 5);
        assert_eq!(build.directory.len(), 1);
    }

    #[test]
    fn names_stop_at_first_non_printable_and_cap_at_thirty() {
        let long_name = "N".repeat(40);
        let mut block = player_block(&long_name, EntityId::from_be_value(0xC500), 1);
        let frame = frame_from_blocks(&[block.clone()]);
        let build = build_directory(&frame).expect("Expected one player");
        assert_eq!(build.directory.entities()[0].name, "N".repeat(30));

        block[3 + 4] = 0x01;
        let frame = frame_from_blocks(&[block]);
        let build = build_directory(&frame).expect("Expected one player");
        assert_eq!(build.directory.entities()[0].name, "NNNN");
    }

    #[test]
    fn frame_without_valid_blocks_is_fatal() {
        let frame = frame_from_blocks(&[player_block("x", player_id(0), 1)]);
        let result = build_directory(&frame);

        let Err(ReplayError::NoPlayersFound { rejected }) = result else {
            panic!("Expected NoPlayersFound");
        };
        assert_eq!(rejected.len(), 1);
        assert!(build_directory(&[]).is_err());
    }
}
