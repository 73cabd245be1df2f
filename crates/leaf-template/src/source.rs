/*
 * source.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Source positions for tokens, AST nodes and errors.

use std::fmt;

/// A location in template source (0-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Location {
    /// Byte offset from start of source
    pub offset: usize,
    /// Row number (0-indexed)
    pub row: usize,
    /// Column number (0-indexed, in characters not bytes)
    pub column: usize,
}

/// A range in template source from start (inclusive) to end (exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    /// Span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Byte range of this span, for slicing the source.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start.offset..self.end.offset
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start.row + 1, self.start.column + 1)
    }
}

/// Line-start table for converting byte offsets into [`Location`]s.
///
/// Columns count characters. The offsets of UTF-8 continuation bytes are
/// kept sorted so a column is found by binary search, not by rescanning
/// the line.
#[derive(Debug, Clone)]
pub struct SourceIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
    continuation_bytes: Vec<usize>,
}

impl<'a> SourceIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        let continuation_bytes = source
            .bytes()
            .enumerate()
            .filter(|(_, b)| b & 0xC0 == 0x80)
            .map(|(i, _)| i)
            .collect();
        Self {
            source,
            line_starts,
            continuation_bytes,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Convert a byte offset to a location. Offsets past the end clamp to the end.
    pub fn location(&self, offset: usize) -> Location {
        let offset = offset.min(self.source.len());
        let row = match self.line_starts.binary_search(&offset) {
            Ok(row) => row,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[row];
        let skipped = self.continuation_bytes.partition_point(|&i| i < offset)
            - self.continuation_bytes.partition_point(|&i| i < line_start);
        let column = offset - line_start - skipped;
        Location {
            offset,
            row,
            column,
        }
    }

    pub fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.location(start), self.location(end))
    }

    /// The source text covered by `span`, limited to its first line.
    pub fn snippet(&self, span: Span) -> String {
        let text = self.source.get(span.range()).unwrap_or("");
        text.lines().next().unwrap_or("").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_first_line() {
        let index = SourceIndex::new("hello #(name)");
        let loc = index.location(6);
        assert_eq!(loc.row, 0);
        assert_eq!(loc.column, 6);
    }

    #[test]
    fn test_location_after_newline() {
        let index = SourceIndex::new("Fine\n##bad()\nGood");
        let loc = index.location(5);
        assert_eq!(
            loc,
            Location {
                offset: 5,
                row: 1,
                column: 0
            }
        );
        assert_eq!(index.span(5, 11).to_string(), "2:1");
    }

    #[test]
    fn test_location_counts_characters() {
        let index = SourceIndex::new("héllo #(x)");
        // 'é' is two bytes but one column
        assert_eq!(index.location(7).column, 6);
    }

    #[test]
    fn test_location_on_long_line() {
        let line = "é#(x) ".repeat(50_000);
        let index = SourceIndex::new(&line);
        let step = "é#(x) ".len();
        for i in (0..50_000).step_by(997) {
            let loc = index.location(i * step + 2);
            assert_eq!(loc.row, 0);
            assert_eq!(loc.column, i * 6 + 1);
        }

        let index = SourceIndex::new("ü
ab
çd");
        assert_eq!(index.location(8).column, 1);
        assert_eq!(index.location(8).row, 2);
    }

    #[test]
    fn test_location_clamps_to_end() {
        let index = SourceIndex::new("ab");
        assert_eq!(index.location(10).offset, 2);
    }

    #[test]
    fn test_snippet_first_line_only() {
        let index = SourceIndex::new("#if(x) {\n  body\n}");
        let span = index.span(0, 17);
        assert_eq!(index.snippet(span), "#if(x) {");
    }

    #[test]
    fn test_span_to() {
        let index = SourceIndex::new("abcdef");
        let joined = index.span(1, 2).to(index.span(4, 5));
        assert_eq!(joined.range(), 1..5);
    }
}
