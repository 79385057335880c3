//! Signature-agnostic scanning primitive. Finds every offset where a 3-byte
//! signature occurs and a structural validator accepts the surrounding bytes.

pub const SIGNATURE_LENGTH: usize = 3;

pub type Signature = [u8; SIGNATURE_LENGTH];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOverlap {
    /// Resume one byte after each accepted match.
    Overlapping,
    /// Resume after the accepted record.
    Disjoint { record_len: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    pub overlap: MatchOverlap,
    pub max_matches: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            overlap: MatchOverlap::Overlapping,
            max_matches: None,
        }
    }
}

impl ScanOptions {
    pub fn disjoint(record_len: usize) -> Self {
        Self {
            overlap: MatchOverlap::Disjoint { record_len },
            max_matches: None,
        }
    }

    pub fn with_max_matches(mut self, max_matches: usize) -> Self {
        self.max_matches = Some(max_matches);
        self
    }
}

/// Lazy, forward-only iterator over accepted offsets.
pub struct HeaderScan<'a, V> {
    stream: &'a [u8],
    signature: Signature,
    validator: V,
    options: ScanOptions,
    cursor: usize,
    emitted: usize,
}

pub fn scan<V>(stream: &[u8], signature: Signature, validator: V, options: ScanOptions) -> HeaderScan<'_, V>
where
    V: Fn(&[u8], usize) -> bool,
{
    HeaderScan {
        stream,
        signature,
        validator,
        options,
        cursor: 0,
        emitted: 0,
    }
}

impl<V> HeaderScan<'_, V>
where
    V: Fn(&[u8], usize) -> bool,
{
    pub fn restart(&mut self) {
        self.start_at(0);
    }

    /// Repositions the scan. The match budget is reset as well.
    pub fn start_at(&mut self, offset: usize) {
        self.cursor = offset;
        self.emitted = 0;
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    fn next_occurrence(&self, from: usize) -> Option<usize> {
        let remaining = self.stream.get(from..)?;
        remaining
            .windows(SIGNATURE_LENGTH)
            .position(|window| window == self.signature)
            .map(|relative| from + relative)
    }
}

impl<V> Iterator for HeaderScan<'_, V>
where
    V: Fn(&[u8], usize) -> bool,
{
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self
            .options
            .max_matches
            .is_some_and(|max_matches| self.emitted >= max_matches)
        {
            return None;
        }

        while let Some(offset) = self.next_occurrence(self.cursor) {
            if (self.validator)(self.stream, offset) {
                self.cursor = match self.options.overlap {
                    MatchOverlap::Overlapping => offset + 1,
                    MatchOverlap::Disjoint { record_len } => offset + record_len.max(1),
                };
                self.emitted += 1;
                return Some(offset);
            }
            self.cursor = offset + 1;
        }

        self.cursor = self.stream.len();
        None
    }
}
