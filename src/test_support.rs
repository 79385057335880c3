//! Synthetic byte builders shared by the unit tests.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::entity::EntityId;
use crate::frames::FrameSource;

pub(crate) const PLAYER_BLOCK_LENGTH: usize = 0xE0;

pub(crate) fn unique_temp_directory(prefix: &str) -> PathBuf {
    let timestamp_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let process_id = std::process::id();
    std::env::temp_dir().join(format!(
        "vgr_stats_{prefix}_test_{process_id}_{timestamp_nanos}"
    ))
}

/// Player ids in the 50000..=60000 band, one per call index.
pub(crate) fn player_id(slot: u16) -> EntityId {
    EntityId::from_be_value(0xC400 + slot * 0x0101)
}

pub(crate) fn player_block_with_marker(
    marker: [u8; 3],
    name: &str,
    entity_id: EntityId,
    team_byte: u8,
) -> Vec<u8> {
    let mut block = vec![0_u8; PLAYER_BLOCK_LENGTH];
    block[..3].copy_from_slice(&marker);
    let name_bytes = name.as_bytes();
    block[3..3 + name_bytes.len()].copy_from_slice(name_bytes);
    block[0xA5..0xA7].copy_from_slice(&entity_id.le_value().to_le_bytes());
    block[0xD5] = team_byte;
    block
}

pub(crate) fn player_block(name: &str, entity_id: EntityId, team_byte: u8) -> Vec<u8> {
    player_block_with_marker([0xDA, 0x03, 0xEE], name, entity_id, team_byte)
}

/// Seven leading bytes carrying the timestamp, then the 16-byte record.
/// The signature sits at offset 7 of the returned buffer.
pub(crate) fn kill_record(entity_id: EntityId, timestamp: f32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(23);
    bytes.extend_from_slice(&timestamp.to_be_bytes());
    bytes.extend_from_slice(&[0x00, 0x00, 0x00]);
    bytes.extend_from_slice(&[0x18, 0x04, 0x1C, 0x00, 0x00]);
    bytes.extend_from_slice(&entity_id.be_value().to_be_bytes());
    bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
    bytes.extend_from_slice(&[0x3F, 0x80, 0x00, 0x00]);
    bytes.push(0x29);
    bytes
}

pub(crate) fn death_record(entity_id: EntityId, timestamp: f32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(13);
    bytes.extend_from_slice(&[0x08, 0x04, 0x31, 0x00, 0x00]);
    bytes.extend_from_slice(&entity_id.be_value().to_be_bytes());
    bytes.extend_from_slice(&[0x00, 0x00]);
    bytes.extend_from_slice(&timestamp.to_be_bytes());
    bytes
}

pub(crate) fn credit_record(entity_id: EntityId, value: f32, action: u8) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(12);
    bytes.extend_from_slice(&[0x10, 0x04, 0x1D, 0x00, 0x00]);
    bytes.extend_from_slice(&entity_id.be_value().to_be_bytes());
    bytes.extend_from_slice(&value.to_be_bytes());
    bytes.push(action);
    bytes
}

pub(crate) fn filler(length: usize) -> Vec<u8> {
    vec![0x00; length]
}

/// Builds the frame sources of one synthetic replay: the player blocks form
/// frame 0, each entry of `event_frames` becomes the next frame.
pub(crate) fn synthetic_replay(
    replay_name: &str,
    player_blocks: &[Vec<u8>],
    event_frames: &[Vec<u8>],
) -> Vec<FrameSource> {
    let mut first_frame = filler(16);
    for block in player_blocks {
        first_frame.extend_from_slice(block);
    }
    first_frame.extend(filler(16));

    let mut sources = vec![FrameSource::new(
        format!("{replay_name}.0.vgr"),
        first_frame,
    )];
    for (position, frame_bytes) in event_frames.iter().enumerate() {
        sources.push(FrameSource::new(
            format!("{replay_name}.{}.vgr", position + 1),
            frame_bytes.clone(),
        ));
    }
    sources
}
