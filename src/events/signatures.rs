use crate::scanner::{MatchOverlap, Signature};

use super::RecordFamily;

/// Fixed layout of one record family, relative to the signature start.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RecordLayout {
    pub family: RecordFamily,
    pub signature: Signature,
    /// Bytes from the signature start to the end of the record.
    pub record_len: usize,
    pub overlap: MatchOverlap,
}

pub(crate) const KILL_LAYOUT: RecordLayout = RecordLayout {
    family: RecordFamily::Kill,
    signature: [0x18, 0x04, 0x1C],
    record_len: 16,
    overlap: MatchOverlap::Disjoint { record_len: 16 },
};

pub(crate) const DEATH_LAYOUT: RecordLayout = RecordLayout {
    family: RecordFamily::Death,
    signature: [0x08, 0x04, 0x31],
    record_len: 13,
    overlap: MatchOverlap::Overlapping,
};

pub(crate) const CREDIT_LAYOUT: RecordLayout = RecordLayout {
    family: RecordFamily::Credit,
    signature: [0x10, 0x04, 0x1D],
    record_len: 12,
    overlap: MatchOverlap::Overlapping,
};

pub(crate) const SIGNATURE_TABLE: [RecordLayout; 3] = [KILL_LAYOUT, DEATH_LAYOUT, CREDIT_LAYOUT];

pub(crate) fn read_u16_be(stream: &[u8], offset: usize) -> Option<u16> {
    let bytes = stream.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_f32_be(stream: &[u8], offset: usize) -> Option<f32> {
    let bytes = stream.get(offset..offset + 4)?;
    Some(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn bytes_equal(stream: &[u8], offset: usize, expected: &[u8]) -> bool {
    stream
        .get(offset..offset + expected.len())
        .is_some_and(|actual| actual == expected)
}

#[cfg(test)]
mod tests {
    use super::{read_f32_be, read_u16_be, SIGNATURE_TABLE};

    #[test]
    fn signatures_are_unique_per_family() {
        for (position, layout) in SIGNATURE_TABLE.iter().enumerate() {
            assert!(layout.record_len > layout.signature.len());
            for other in &SIGNATURE_TABLE[position + 1..] {
                assert_ne!(layout.signature, other.signature);
            }
        }
    }

    #[test]
    fn big_endian_readers_stop_at_stream_end() {
        let stream = [0x3F, 0x80, 0x00, 0x00, 0xDC];
        assert_eq!(read_f32_be(&stream, 0), Some(1.0));
        assert_eq!(read_f32_be(&stream, 2), None);
        assert_eq!(read_u16_be(&stream, 3), Some(0x00DC));
        assert_eq!(read_u16_be(&stream, 4), None);
    }
}
