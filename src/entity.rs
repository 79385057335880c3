use serde::{Deserialize, Serialize};
use std::fmt;

/// Converts between the little-endian reading found in player blocks and the
/// big-endian reading used by every event record. Self-inverse.
pub const fn swap_endianness(value: u16) -> u16 {
    value.swap_bytes()
}

/// 16-bit entity identifier. The held value is the big-endian reading of the
/// two stream bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u16);

impl EntityId {
    pub const fn from_be_value(value: u16) -> Self {
        Self(value)
    }

    pub const fn from_le_value(value: u16) -> Self {
        Self(swap_endianness(value))
    }

    pub const fn from_be_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    pub const fn be_value(self) -> u16 {
        self.0
    }

    pub const fn le_value(self) -> u16 {
        swap_endianness(self.0)
    }

    pub fn role(self) -> EntityRole {
        EntityRole::from_be_value(self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityRole {
    System,
    Structure,
    Minion,
    Player,
}

impl EntityRole {
    pub fn from_be_value(value: u16) -> Self {
        match value {
            0..=999 => EntityRole::System,
            1000..=19_999 => EntityRole::Structure,
            20_000..=49_999 => EntityRole::Minion,
            50_000..=60_000 => EntityRole::Player,
            // Kraken, gold mine and other large-id objectives.
            _ => EntityRole::Structure,
        }
    }
}

/// Raw team-grouping byte from a player block. Groups players, says nothing
/// about left or right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamGroup(u8);

impl TeamGroup {
    pub const ONE: TeamGroup = TeamGroup(1);
    pub const TWO: TeamGroup = TeamGroup(2);

    pub fn from_raw(byte: u8) -> Option<Self> {
        match byte {
            1 | 2 => Some(Self(byte)),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    pub fn other(self) -> Self {
        if self.0 == 1 {
            TeamGroup::TWO
        } else {
            TeamGroup::ONE
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub team: TeamGroup,
    pub role: EntityRole,
    pub block_offset: usize,
    pub directory_position: usize,
}
