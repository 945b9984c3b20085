use serde::{Deserialize, Serialize};

/// Byte span inside a source file.
///
/// Offsets are byte indices into the file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    /// Start byte offset (inclusive).
    pub start: usize,

    /// End byte offset (exclusive).
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span [{start}, {end}) is inverted");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Inclusive, 1-based range of line numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn covers(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }
}

/// Offsets of the first byte of every line, for offset → line lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(code: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            code.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            starts,
            len: code.len(),
        }
    }

    /// Number of lines; a trailing newline does not open a new line.
    pub fn line_count(&self) -> u32 {
        let n = self.starts.len();
        if n > 1 && self.starts[n - 1] == self.len {
            (n - 1) as u32
        } else {
            n as u32
        }
    }

    /// 1-based line containing byte `offset`.
    pub fn line_of(&self, offset: usize) -> u32 {
        self.starts.partition_point(|&s| s <= offset) as u32
    }

    /// Line range covered by `span`. The end byte is exclusive.
    pub fn lines_of(&self, span: SourceSpan) -> LineRange {
        let start = self.line_of(span.start);
        let end = self.line_of(span.end.saturating_sub(1).max(span.start));
        LineRange { start, end }
    }

    /// Convert a byte offset into a 1-based (line, column) location.
    ///
    /// Column counts Unicode scalar values on the line segment.
    pub fn line_col(&self, code: &str, offset: usize) -> Option<(u32, usize)> {
        if offset > code.len() {
            return None;
        }
        let line = self.line_of(offset);
        let line_start = self.starts[(line - 1) as usize];
        let col = code.get(line_start..offset)?.chars().count() + 1;
        Some((line, col))
    }
}
