use crate::directory::EntityDirectory;
use crate::entity::EntityId;
use crate::frames::ByteStream;
use crate::scanner::{scan, ScanOptions};
use crate::settings::DecoderSettings;

use super::signatures::{bytes_equal, read_f32_be, read_u16_be, KILL_LAYOUT};
use super::{EventRecord, RecordHeader};

const TIMESTAMP_LEAD: usize = 7;

/// Structural check only; says nothing about whether the id is a player.
pub(crate) fn is_kill_record(stream: &[u8], offset: usize) -> bool {
    offset + KILL_LAYOUT.record_len <= stream.len()
        && bytes_equal(stream, offset, &KILL_LAYOUT.signature)
        && bytes_equal(stream, offset + 3, &[0x00, 0x00])
        && bytes_equal(stream, offset + 7, &[0xFF, 0xFF, 0xFF, 0xFF])
        && bytes_equal(stream, offset + 11, &[0x3F, 0x80, 0x00, 0x00])
        && stream[offset + 15] == 0x29
}

pub(crate) fn kill_entity_id(stream: &[u8], offset: usize) -> Option<EntityId> {
    read_u16_be(stream, offset + 5).map(EntityId::from_be_value)
}

fn kill_timestamp(stream: &[u8], offset: usize, settings: &DecoderSettings) -> Option<f32> {
    let timestamp_offset = offset.checked_sub(TIMESTAMP_LEAD)?;
    read_f32_be(stream, timestamp_offset).filter(|seconds| settings.is_valid_timestamp(*seconds))
}

pub(crate) fn scan_kills(
    stream: &ByteStream,
    directory: &EntityDirectory,
    settings: &DecoderSettings,
) -> Vec<EventRecord> {
    let bytes = stream.as_bytes();
    let validator = |candidate: &[u8], offset: usize| {
        is_kill_record(candidate, offset)
            && kill_entity_id(candidate, offset).is_some_and(|entity_id| directory.contains(entity_id))
    };

    scan(
        bytes,
        KILL_LAYOUT.signature,
        validator,
        ScanOptions {
            overlap: KILL_LAYOUT.overlap,
            max_matches: None,
        },
    )
    .filter_map(|offset| {
        let entity_id = kill_entity_id(bytes, offset)?;
        Some(EventRecord::Kill(RecordHeader::new(
            stream,
            entity_id,
            kill_timestamp(bytes, offset, settings),
            offset,
        )))
    })
    .collect()
}

/// Offsets of every structurally valid kill record, whoever the killer is.
/// These bound the credit window of the preceding kill.
pub(crate) fn kill_boundaries(stream: &ByteStream) -> Vec<usize> {
    scan(
        stream.as_bytes(),
        KILL_LAYOUT.signature,
        is_kill_record,
        ScanOptions::default(),
    )
    .collect()
}
