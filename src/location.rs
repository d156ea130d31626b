//! Source location utilities.

use std::fmt;

/// Row/column location within the source document (1-indexed, character-based).
///
/// Locations only ever describe where an error happened. Nothing in the reader
/// branches on them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Location {
    /// 1-indexed line number in the input.
    pub(crate) line: u32,
    /// 1-indexed column number in the input, counted in characters.
    pub(crate) column: u32,
}

impl Location {
    /// Sentinel value meaning "location unknown".
    pub const UNKNOWN: Self = Self { line: 0, column: 0 };

    /// Create a new location record from 1-indexed coordinates.
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    #[inline]
    pub fn line(&self) -> u64 {
        self.line as u64
    }

    #[inline]
    pub fn column(&self) -> u64 {
        self.column as u64
    }

    #[inline]
    pub fn is_known(&self) -> bool {
        self.line != 0 && self.column != 0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.line, self.column)
    }
}

/// Byte offset to line/column translation for one source text.
///
/// Built once per document; lookups are a binary search over line starts.
#[derive(Clone, Debug)]
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut starts = Vec::with_capacity(text.len() / 32 + 1);
        starts.push(0);
        starts.extend(
            text.bytes()
                .enumerate()
                .filter_map(|(i, b)| (b == b'\n').then_some(i + 1)),
        );
        Self { starts }
    }

    /// Location of the character starting at byte `offset` of `text`.
    ///
    /// Offsets past the end clamp to the end of the text. An offset that falls
    /// inside a multibyte character is moved back to the character start.
    pub(crate) fn location(&self, text: &str, offset: usize) -> Location {
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = match self.starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let start = self.starts[line];
        let column = text[start..offset].chars().count() + 1;
        // 4 Gb is larger than any content document we expect to see.
        Location::new((line + 1) as u32, column as u32)
    }
}
