//! Match metadata stored as plain strings in the first frame.

use serde::Serialize;

use crate::scanner::{scan, ScanOptions, Signature};

const GAME_MODE_PREFIX: &[u8] = b"GameMode_";
const GAME_MODE_SIGNATURE: Signature = [b'G', b'a', b'm'];
const MAX_GAME_MODE_LENGTH: usize = 48;
const DEFAULT_TEAM_SIZE: usize = 3;

const KNOWN_GAME_MODES: [&str; 7] = [
    "GameMode_HF_Ranked",
    "GameMode_HF_Casual",
    "GameMode_5v5_Ranked",
    "GameMode_5v5_Casual",
    "GameMode_Blitz",
    "GameMode_ARAL",
    "GameMode_BR",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GameMap {
    HalcyonFold,
    SovereignRise,
    Unknown,
}

impl GameMap {
    pub fn display_name(self) -> &'static str {
        match self {
            GameMap::HalcyonFold => "Halcyon Fold",
            GameMap::SovereignRise => "Sovereign Rise",
            GameMap::Unknown => "Unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub game_mode: Option<String>,
    /// Players per side. 3 unless the mode says 5v5.
    pub team_size: usize,
    pub map: GameMap,
}

impl Default for MatchInfo {
    fn default() -> Self {
        Self::from_game_mode(None)
    }
}

impl MatchInfo {
    pub fn from_game_mode(game_mode: Option<String>) -> Self {
        let (team_size, map) = match game_mode.as_deref() {
            Some(mode) if mode.contains("5v5") => (5, GameMap::SovereignRise),
            Some(mode) if ["HF", "Blitz", "ARAL"].iter().any(|tag| mode.contains(tag)) => {
                (DEFAULT_TEAM_SIZE, GameMap::HalcyonFold)
            }
            _ => (DEFAULT_TEAM_SIZE, GameMap::Unknown),
        };

        Self {
            game_mode,
            team_size,
            map,
        }
    }

    pub fn expected_player_count(&self) -> usize {
        self.team_size * 2
    }
}

/// First `GameMode_*` token in the frame. Known modes are reported under their
/// canonical name, anything else verbatim.
pub fn find_game_mode(first_frame: &[u8]) -> Option<String> {
    let offset = scan(
        first_frame,
        GAME_MODE_SIGNATURE,
        |bytes: &[u8], offset: usize| {
            bytes
                .get(offset..)
                .is_some_and(|tail| tail.starts_with(GAME_MODE_PREFIX))
        },
        ScanOptions::default().with_max_matches(1),
    )
    .next()?;

    let token = first_frame[offset..]
        .iter()
        .take(MAX_GAME_MODE_LENGTH)
        .take_while(|byte| byte.is_ascii_alphanumeric() || **byte == b'_')
        .map(|byte| char::from(*byte))
        .collect::<String>();

    let canonical = KNOWN_GAME_MODES
        .iter()
        .copied()
        .find(|known| token.starts_with(known));
    Some(canonical.map_or(token, str::to_string))
}

pub fn read_match_info(first_frame: &[u8]) -> MatchInfo {
    let match_info = MatchInfo::from_game_mode(find_game_mode(first_frame));
    tracing::debug!(
        game_mode = match_info.game_mode.as_deref().unwrap_or("unknown"),
        team_size = match_info.team_size,
        map = match_info.map.display_name(),
        "Read match info"
    );
    match_info
}

#[cfg(test)]
mod tests {
    use super::{find_game_mode, read_match_info, GameMap, MatchInfo};
    use crate::test_support::filler;

    fn frame_with(text: &[u8]) -> Vec<u8> {
        let mut frame = filler(12);
        frame.extend_from_slice(b"Gam");
        frame.extend(filler(4));
        frame.extend_from_slice(text);
        frame.push(0x00);
        frame.extend(filler(12));
        frame
    }

    #[test]
    fn five_versus_five_modes_use_sovereign_rise() {
        let match_info = read_match_info(&frame_with(b"GameMode_5v5_Ranked"));
        assert_eq!(match_info.game_mode.as_deref(), Some("GameMode_5v5_Ranked"));
        assert_eq!(match_info.team_size, 5);
        assert_eq!(match_info.map, GameMap::SovereignRise);
        assert_eq!(match_info.expected_player_count(), 10);
    }

    #[test]
    fn three_versus_three_modes_use_halcyon_fold() {
        let match_info = read_match_info(&frame_with(b"GameMode_HF_Casual"));
        assert_eq!(match_info.team_size, 3);
        assert_eq!(match_info.map, GameMap::HalcyonFold);

        let blitz = read_match_info(&frame_with(b"GameMode_Blitz_PvP"));
        assert_eq!(blitz.game_mode.as_deref(), Some("GameMode_Blitz"));
        assert_eq!(blitz.map, GameMap::HalcyonFold);
    }

    #[test]
    fn unknown_modes_are_kept_verbatim() {
        assert_eq!(
            find_game_mode(&frame_with(b"GameMode_Custom7")).as_deref(),
            Some("GameMode_Custom7")
        );
        assert_eq!(
            read_match_info(&frame_with(b"GameMode_Custom7")).map,
            GameMap::Unknown
        );
    }

    #[test]
    fn frame_without_mode_string_defaults_to_three_a_side() {
        let match_info = read_match_info(&filler(64));
        assert_eq!(match_info, MatchInfo::default());
        assert_eq!(match_info.game_mode, None);
        assert_eq!(match_info.team_size, 3);
        assert_eq!(match_info.map, GameMap::Unknown);
    }
}
