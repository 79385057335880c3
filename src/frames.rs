//! Frame assembly: orders the frame captures of one replay and joins them into
//! a single addressable byte stream.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ReplayError;

const FRAME_FILE_EXTENSION: &str = "vgr";

/// One frame capture as handed over by whoever enumerated the replay on disk.
#[derive(Debug, Clone)]
pub struct FrameSource {
    pub identifier: String,
    pub bytes: Vec<u8>,
}

impl FrameSource {
    pub fn new(identifier: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            identifier: identifier.into(),
            bytes,
        }
    }

    pub fn read_from_path(path: &Path) -> Result<Self, ReplayError> {
        let bytes = fs::read(path).map_err(|error| ReplayError::io(path, error))?;
        let identifier = path
            .file_name()
            .map(|value| value.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Ok(Self { identifier, bytes })
    }
}

pub fn read_frame_sources(paths: &[PathBuf]) -> Result<Vec<FrameSource>, ReplayError> {
    paths
        .iter()
        .map(|path| FrameSource::read_from_path(path))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: usize,
    pub identifier: String,
    pub bytes: Vec<u8>,
}

/// Absolute byte range `[start, end)` of one frame inside the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    pub start: usize,
    pub end: usize,
    pub frame_index: usize,
}

impl FrameSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        (self.start..self.end).contains(&offset)
    }
}

/// All frames of a replay laid end to end.
#[derive(Debug, Clone, Default)]
pub struct ByteStream {
    data: Vec<u8>,
    spans: Vec<FrameSpan>,
}

impl ByteStream {
    pub fn from_frames(frames: &[Frame]) -> Self {
        let total_length = frames.iter().map(|frame| frame.bytes.len()).sum();
        let mut data = Vec::with_capacity(total_length);
        let mut spans = Vec::with_capacity(frames.len());

        for frame in frames {
            let start = data.len();
            data.extend_from_slice(&frame.bytes);
            spans.push(FrameSpan {
                start,
                end: data.len(),
                frame_index: frame.index,
            });
        }

        Self { data, spans }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn spans(&self) -> &[FrameSpan] {
        &self.spans
    }

    /// Frame index owning `offset`, or `None` past the end of the stream.
    pub fn frame_index_at(&self, offset: usize) -> Option<usize> {
        if offset >= self.data.len() {
            return None;
        }

        // First span whose end lies beyond the offset; empty spans never own bytes.
        let position = self.spans.partition_point(|span| span.end <= offset);
        self.spans
            .get(position)
            .filter(|span| span.contains(offset))
            .map(|span| span.frame_index)
    }
}

/// Frames of one replay plus their concatenation.
#[derive(Debug, Clone)]
pub struct AssembledReplay {
    pub replay_name: String,
    pub frames: Vec<Frame>,
    pub stream: ByteStream,
}

impl AssembledReplay {
    pub fn first_frame(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// `"abc-123.17.vgr"` -> `Some(17)`.
pub fn parse_frame_index(identifier: &str) -> Option<usize> {
    let stem = frame_stem(identifier);
    let (_, index) = stem.rsplit_once('.')?;
    index.parse::<usize>().ok()
}

/// `"abc-123.17.vgr"` -> `"abc-123"`.
pub fn replay_name_from_identifier(identifier: &str) -> String {
    let stem = frame_stem(identifier);
    match stem.rsplit_once('.') {
        Some((name, index)) if index.chars().all(|character| character.is_ascii_digit()) => {
            name.to_string()
        }
        _ => stem.to_string(),
    }
}

fn frame_stem(identifier: &str) -> &str {
    let file_name = identifier
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(identifier);

    match file_name.rsplit_once('.') {
        Some((stem, extension)) if extension.eq_ignore_ascii_case(FRAME_FILE_EXTENSION) => stem,
        _ => file_name,
    }
}

pub fn assemble_frames(
    replay_name: &str,
    sources: Vec<FrameSource>,
) -> Result<AssembledReplay, ReplayError> {
    if sources.is_empty() {
        return Err(ReplayError::IncompleteReplay {
            replay: replay_name.to_string(),
        });
    }

    let mut frames = sources
        .into_iter()
        .map(|source| {
            let index = parse_frame_index(&source.identifier).unwrap_or_else(|| {
                tracing::warn!(
                    frame_identifier = %source.identifier,
                    "Failed to parse frame index, defaulting to 0"
                );
                0
            });
            Frame {
                index,
                identifier: source.identifier,
                bytes: source.bytes,
            }
        })
        .collect::<Vec<Frame>>();

    // Stable: frames sharing an index keep the order they were handed over in.
    frames.sort_by_key(|frame| frame.index);

    let stream = ByteStream::from_frames(&frames);

    tracing::debug!(
        replay = replay_name,
        frame_count = frames.len(),
        stream_bytes = stream.len(),
        "Assembled replay frames"
    );

    Ok(AssembledReplay {
        replay_name: replay_name.to_string(),
        frames,
        stream,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        assemble_frames, parse_frame_index, read_frame_sources, replay_name_from_identifier,
        FrameSource,
    };
    use crate::error::ReplayError;
    use crate::test_support::unique_temp_directory;
    use proptest::prelude::*;

    #[test]
    fn parses_frame_index_from_file_names() {
        assert_eq!(parse_frame_index("a1b2-c3d4.0.vgr"), Some(0));
        assert_eq!(parse_frame_index("a1b2-c3d4.117.vgr"), Some(117));
        assert_eq!(parse_frame_index(r"C:\cache\a1b2.9.vgr"), Some(9));
        assert_eq!(parse_frame_index("replay/a1b2.12.VGR"), Some(12));
        assert_eq!(parse_frame_index("a1b2.final.vgr"), None);
        assert_eq!(parse_frame_index("a1b2"), None);
    }

    #[test]
    fn derives_replay_name_from_identifier() {
        assert_eq!(replay_name_from_identifier("abc-def.4.vgr"), "abc-def");
        assert_eq!(replay_name_from_identifier("dir/abc-def.vgr"), "abc-def");
        assert_eq!(replay_name_from_identifier("abc.def.x.vgr"), "abc.def.x");
    }

    #[test]
    fn orders_frames_by_parsed_index() {
        let sources = vec![
            FrameSource::new("m.2.vgr", vec![2, 2]),
            FrameSource::new("m.0.vgr", vec![0]),
            FrameSource::new("m.1.vgr", vec![1, 1, 1]),
        ];

        let assembled = assemble_frames("m", sources).expect("Expected assembly to succeed");
        let order = assembled
            .frames
            .iter()
            .map(|frame| frame.index)
            .collect::<Vec<usize>>();

        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(assembled.stream.as_bytes(), &[0, 1, 1, 1, 2, 2]);
        assert_eq!(assembled.stream.frame_index_at(0), Some(0));
        assert_eq!(assembled.stream.frame_index_at(3), Some(1));
        assert_eq!(assembled.stream.frame_index_at(5), Some(2));
        assert_eq!(assembled.stream.frame_index_at(6), None);
    }

    #[test]
    fn malformed_identifiers_default_to_index_zero() {
        let sources = vec![
            FrameSource::new("m.1.vgr", vec![1]),
            FrameSource::new("garbage-name", vec![9]),
        ];

        let assembled = assemble_frames("m", sources).expect("Malformed names must not abort");
        assert_eq!(assembled.frames[0].identifier, "garbage-name");
        assert_eq!(assembled.frames[0].index, 0);
        assert_eq!(assembled.frame_count(), 2);
    }

    #[test]
    fn zero_sources_is_an_incomplete_replay() {
        let result = assemble_frames("lonely", Vec::new());
        assert!(matches!(
            result,
            Err(ReplayError::IncompleteReplay { ref replay }) if replay == "lonely"
        ));
    }

    #[test]
    fn empty_frames_own_no_offsets() {
        let sources = vec![
            FrameSource::new("m.0.vgr", vec![7, 7]),
            FrameSource::new("m.1.vgr", Vec::new()),
            FrameSource::new("m.2.vgr", vec![8]),
        ];

        let assembled = assemble_frames("m", sources).expect("Expected assembly to succeed");
        assert_eq!(assembled.stream.frame_index_at(1), Some(0));
        assert_eq!(assembled.stream.frame_index_at(2), Some(2));
    }

    #[test]
    fn reads_frame_sources_from_disk() {
        let temp_directory = unique_temp_directory("frames_read");
        std::fs::create_dir_all(&temp_directory)
            .expect("Failed to create temporary frame test directory");

        let first = temp_directory.join("replay.0.vgr");
        let second = temp_directory.join("replay.1.vgr");
        std::fs::write(&first, [1_u8, 2, 3]).expect("Failed to write frame 0");
        std::fs::write(&second, [4_u8]).expect("Failed to write frame 1");

        let sources = read_frame_sources(&[second.clone(), first.clone()])
            .expect("Expected frame files to be readable");
        let assembled = assemble_frames("replay", sources).expect("Expected assembly to succeed");

        assert_eq!(assembled.stream.as_bytes(), &[1, 2, 3, 4]);
        assert_eq!(assembled.frames[0].identifier, "replay.0.vgr");

        let missing = read_frame_sources(&[temp_directory.join("replay.7.vgr")]);
        assert!(matches!(missing, Err(ReplayError::Io { .. })));

        std::fs::remove_dir_all(&temp_directory)
            .expect("Failed to remove temporary frame test directory");
    }

    proptest! {
        #[test]
        fn every_offset_maps_to_exactly_one_frame(
            lengths in proptest::collection::vec(0_usize..64, 1..12)
        ) {
            let sources = lengths
                .iter()
                .enumerate()
                .map(|(index, length)| FrameSource::new(format!("p.{index}.vgr"), vec![0xAB; *length]))
                .collect::<Vec<FrameSource>>();

            let assembled = assemble_frames("p", sources).expect("non-empty sources");
            let spans = assembled.stream.spans();

            let mut expected_start = 0;
            for span in spans {
                prop_assert_eq!(span.start, expected_start);
                prop_assert!(span.end >= span.start);
                expected_start = span.end;
            }
            prop_assert_eq!(expected_start, assembled.stream.len());

            for offset in 0..assembled.stream.len() {
                let owners = spans.iter().filter(|span| span.contains(offset)).count();
                prop_assert_eq!(owners, 1);
                let owner = spans.iter().find(|span| span.contains(offset)).map(|span| span.frame_index);
                prop_assert_eq!(assembled.stream.frame_index_at(offset), owner);
            }
        }
    }
}
