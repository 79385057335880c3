use crate::directory::EntityDirectory;
use crate::entity::EntityId;
use crate::frames::ByteStream;
use crate::scanner::{scan, ScanOptions};
use crate::settings::DecoderSettings;

use super::signatures::{bytes_equal, read_f32_be, read_u16_be, DEATH_LAYOUT};
use super::{EventRecord, RecordHeader};

pub(crate) fn is_death_record(stream: &[u8], offset: usize) -> bool {
    offset + DEATH_LAYOUT.record_len <= stream.len()
        && bytes_equal(stream, offset, &DEATH_LAYOUT.signature)
        && bytes_equal(stream, offset + 3, &[0x00, 0x00])
        && bytes_equal(stream, offset + 7, &[0x00, 0x00])
}

fn death_entity_id(stream: &[u8], offset: usize) -> Option<EntityId> {
    read_u16_be(stream, offset + 5).map(EntityId::from_be_value)
}

fn death_timestamp(stream: &[u8], offset: usize, settings: &DecoderSettings) -> Option<f32> {
    read_f32_be(stream, offset + 9).filter(|seconds| settings.is_valid_timestamp(*seconds))
}

pub(crate) fn scan_deaths(
    stream: &ByteStream,
    directory: &EntityDirectory,
    settings: &DecoderSettings,
) -> Vec<EventRecord> {
    let bytes = stream.as_bytes();
    let validator = |candidate: &[u8], offset: usize| {
        is_death_record(candidate, offset)
            && death_entity_id(candidate, offset).is_some_and(|entity_id| directory.contains(entity_id))
            && (!settings.strict_death_timestamps
                || death_timestamp(candidate, offset, settings).is_some())
    };

    scan(
        bytes,
        DEATH_LAYOUT.signature,
        validator,
        ScanOptions {
            overlap: DEATH_LAYOUT.overlap,
            max_matches: None,
        },
    )
    .filter_map(|offset| {
        let entity_id = death_entity_id(bytes, offset)?;
        Some(EventRecord::Death(RecordHeader::new(
            stream,
            entity_id,
            death_timestamp(bytes, offset, settings),
            offset,
        )))
    })
    .collect()
}
