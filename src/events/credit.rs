use crate::directory::EntityDirectory;
use crate::entity::EntityId;
use crate::frames::ByteStream;
use crate::scanner::{scan, ScanOptions};
use crate::settings::DecoderSettings;

use super::signatures::{bytes_equal, read_f32_be, read_u16_be, CREDIT_LAYOUT};
use super::{EventRecord, RecordHeader};

pub(crate) fn is_credit_record(stream: &[u8], offset: usize) -> bool {
    offset + CREDIT_LAYOUT.record_len <= stream.len()
        && bytes_equal(stream, offset, &CREDIT_LAYOUT.signature)
        && bytes_equal(stream, offset + 3, &[0x00, 0x00])
}

fn credit_payload(stream: &[u8], offset: usize) -> Option<(EntityId, f32, u8)> {
    let entity_id = read_u16_be(stream, offset + 5).map(EntityId::from_be_value)?;
    let value = read_f32_be(stream, offset + 7)?;
    let action = *stream.get(offset + 11)?;
    Some((entity_id, value, action))
}

/// NaN fails both comparisons and is rejected with the rest of the noise.
pub(crate) fn is_plausible_credit_value(value: f32, settings: &DecoderSettings) -> bool {
    value >= 0.0 && value <= settings.max_credit_value
}

pub(crate) fn scan_credits(
    stream: &ByteStream,
    directory: &EntityDirectory,
    settings: &DecoderSettings,
) -> Vec<EventRecord> {
    let bytes = stream.as_bytes();
    let validator = |candidate: &[u8], offset: usize| {
        is_credit_record(candidate, offset)
            && credit_payload(candidate, offset).is_some_and(|(entity_id, value, _)| {
                directory.contains(entity_id) && is_plausible_credit_value(value, settings)
            })
    };

    scan(
        bytes,
        CREDIT_LAYOUT.signature,
        validator,
        ScanOptions {
            overlap: CREDIT_LAYOUT.overlap,
            max_matches: None,
        },
    )
    .filter_map(|offset| {
        let (entity_id, value, action) = credit_payload(bytes, offset)?;
        Some(EventRecord::Credit {
            header: RecordHeader::new(stream, entity_id, None, offset),
            value,
            action,
        })
    })
    .collect()
}
