//! Kill, death and credit record families recognized on top of the header
//! scanner.

mod classifier;
mod credit;
mod death;
mod kill;
pub(crate) mod signatures;

use serde::Serialize;
use std::fmt;

use crate::entity::EntityId;
use crate::frames::ByteStream;

pub use classifier::{classify_events, ClassifiedEvents, DecodeWarning, FamilyCounts};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordFamily {
    Kill,
    Death,
    Credit,
}

impl fmt::Display for RecordFamily {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordFamily::Kill => "kill",
            RecordFamily::Death => "death",
            RecordFamily::Credit => "credit",
        };
        formatter.write_str(label)
    }
}

/// Fields shared by every record family.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHeader {
    pub entity_id: EntityId,
    /// Seconds since match start; `None` when the encoded value is outside the
    /// plausible range or the family carries no timestamp.
    pub timestamp: Option<f32>,
    pub offset: usize,
    pub frame_index: usize,
}

impl RecordHeader {
    pub(crate) fn new(
        stream: &ByteStream,
        entity_id: EntityId,
        timestamp: Option<f32>,
        offset: usize,
    ) -> Self {
        Self {
            entity_id,
            timestamp,
            offset,
            frame_index: stream.frame_index_at(offset).unwrap_or_default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "family")]
pub enum EventRecord {
    Kill(RecordHeader),
    Death(RecordHeader),
    Credit {
        #[serde(flatten)]
        header: RecordHeader,
        value: f32,
        action: u8,
    },
}

impl EventRecord {
    pub fn family(&self) -> RecordFamily {
        match self {
            EventRecord::Kill(_) => RecordFamily::Kill,
            EventRecord::Death(_) => RecordFamily::Death,
            EventRecord::Credit { .. } => RecordFamily::Credit,
        }
    }

    pub fn header(&self) -> &RecordHeader {
        match self {
            EventRecord::Kill(header) | EventRecord::Death(header) => header,
            EventRecord::Credit { header, .. } => header,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.header().entity_id
    }

    pub fn offset(&self) -> usize {
        self.header().offset
    }

    pub fn timestamp(&self) -> Option<f32> {
        self.header().timestamp
    }

    pub fn is_kill(&self) -> bool {
        matches!(self, EventRecord::Kill(_))
    }
}
