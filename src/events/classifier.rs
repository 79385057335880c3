use serde::Serialize;
use std::thread;

use crate::directory::EntityDirectory;
use crate::frames::ByteStream;
use crate::settings::DecoderSettings;

use super::credit::scan_credits;
use super::death::scan_deaths;
use super::kill::{kill_boundaries, scan_kills};
use super::signatures::SIGNATURE_TABLE;
use super::{EventRecord, RecordFamily, RecordHeader};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyCounts {
    pub kills: usize,
    pub deaths: usize,
    pub credits: usize,
}

impl FamilyCounts {
    pub fn get(&self, family: RecordFamily) -> usize {
        match family {
            RecordFamily::Kill => self.kills,
            RecordFamily::Death => self.deaths,
            RecordFamily::Credit => self.credits,
        }
    }

    fn record(&mut self, family: RecordFamily) {
        match family {
            RecordFamily::Kill => self.kills += 1,
            RecordFamily::Death => self.deaths += 1,
            RecordFamily::Credit => self.credits += 1,
        }
    }
}

/// Non-fatal conditions noticed while decoding a replay.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum DecodeWarning {
    ZeroRecordsForFamily { family: RecordFamily },
    PostGameDeathsDiscarded { count: usize, cutoff_seconds: f32 },
    PlayerCountMismatch { players: usize, expected: usize },
}

#[derive(Clone, Debug, Default)]
pub struct ClassifiedEvents {
    records: Vec<EventRecord>,
    kill_boundaries: Vec<usize>,
    counts: FamilyCounts,
    warnings: Vec<DecodeWarning>,
}

impl ClassifiedEvents {
    fn from_records(mut records: Vec<EventRecord>, kill_boundaries: Vec<usize>) -> Self {
        records.sort_by_key(EventRecord::offset);

        let mut counts = FamilyCounts::default();
        for record in &records {
            counts.record(record.family());
        }

        let warnings = SIGNATURE_TABLE
            .iter()
            .filter(|layout| counts.get(layout.family) == 0)
            .map(|layout| {
                tracing::warn!(family = %layout.family, "No records found for family");
                DecodeWarning::ZeroRecordsForFamily {
                    family: layout.family,
                }
            })
            .collect();

        Self {
            records,
            kill_boundaries,
            counts,
            warnings,
        }
    }

    /// All accepted records in stream-offset order.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Offsets of all structurally valid kill records, including kills by
    /// entities outside the directory.
    pub fn kill_boundaries(&self) -> &[usize] {
        &self.kill_boundaries
    }

    pub fn counts(&self) -> FamilyCounts {
        self.counts
    }

    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    pub fn kills(&self) -> impl Iterator<Item = &RecordHeader> {
        self.records.iter().filter_map(|record| match record {
            EventRecord::Kill(header) => Some(header),
            _ => None,
        })
    }

    pub fn deaths(&self) -> impl Iterator<Item = &RecordHeader> {
        self.records.iter().filter_map(|record| match record {
            EventRecord::Death(header) => Some(header),
            _ => None,
        })
    }

    pub fn credits(&self) -> impl Iterator<Item = (&RecordHeader, f32, u8)> {
        self.records.iter().filter_map(|record| match record {
            EventRecord::Credit {
                header,
                value,
                action,
            } => Some((header, *value, *action)),
            _ => None,
        })
    }
}

fn scan_family(
    family: RecordFamily,
    stream: &ByteStream,
    directory: &EntityDirectory,
    settings: &DecoderSettings,
) -> Vec<EventRecord> {
    match family {
        RecordFamily::Kill => scan_kills(stream, directory, settings),
        RecordFamily::Death => scan_deaths(stream, directory, settings),
        RecordFamily::Credit => scan_credits(stream, directory, settings),
    }
}

/// Runs every family pass over the stream and merges the results.
pub fn classify_events(
    stream: &ByteStream,
    directory: &EntityDirectory,
    settings: &DecoderSettings,
) -> ClassifiedEvents {
    let records = if settings.parallel_family_scan {
        thread::scope(|scope| {
            let handles = SIGNATURE_TABLE
                .iter()
                .map(|layout| {
                    scope.spawn(move || scan_family(layout.family, stream, directory, settings))
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect::<Vec<EventRecord>>()
        })
    } else {
        SIGNATURE_TABLE
            .iter()
            .flat_map(|layout| scan_family(layout.family, stream, directory, settings))
            .collect::<Vec<EventRecord>>()
    };

    let classified = ClassifiedEvents::from_records(records, kill_boundaries(stream));

    tracing::debug!(
        kills = classified.counts.kills,
        deaths = classified.counts.deaths,
        credits = classified.counts.credits,
        "Classified replay records"
    );

    classified
}
