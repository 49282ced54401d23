//! The patch engine: applies line-range edits to a single in-memory buffer.
//!
//! Every [`PatchOp`] is expressed in *original* coordinates, computed once
//! from the unmodified syntax tree. A [`RewriteSession`] translates them into
//! current-buffer coordinates with a running `cumulative_offset`. Because ops
//! arrive in ascending order and never overlap, everything an op touches lies
//! after everything touched before it, so one scalar offset is enough.

use crate::extract::LineSpan;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Verification of the text an op is about to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

/// One textual edit derived from one element's new docstring.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOp does nothing until applied to a RewriteSession"]
pub struct PatchOp {
    /// Lines to remove, or `None` for a pure insertion.
    pub original_range: Option<LineSpan>,
    /// Line after which the text is inserted when `original_range` is `None`.
    pub insertion_line: usize,
    /// Formatted block, already indented and delimited, without trailing newline.
    pub replacement_text: String,
    /// Expected content of `original_range`, terminators included.
    pub expected_before: Option<EditVerification>,
}

impl PatchOp {
    /// Replace the lines of `range` with `text`.
    pub fn replace(range: LineSpan, text: impl Into<String>) -> Self {
        Self {
            original_range: Some(range),
            insertion_line: range.start.saturating_sub(1),
            replacement_text: text.into(),
            expected_before: None,
        }
    }

    /// Insert `text` right after original line `line` (0 inserts at the top).
    pub fn insert_after(line: usize, text: impl Into<String>) -> Self {
        Self {
            original_range: None,
            insertion_line: line,
            replacement_text: text.into(),
            expected_before: None,
        }
    }

    /// Require the removed lines to match `expected` when applied.
    pub fn verified(mut self, expected: EditVerification) -> Self {
        self.expected_before = Some(expected);
        self
    }

    pub fn new_line_count(&self) -> usize {
        self.replacement_text.lines().count()
    }

    pub fn removed_line_count(&self) -> usize {
        self.original_range.map_or(0, |r| r.len())
    }

    /// Net change in buffer line count once applied.
    pub fn delta(&self) -> isize {
        self.new_line_count() as isize - self.removed_line_count() as isize
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchRangeError {
    #[error("inverted line range {start}-{end}")]
    InvertedRange { start: usize, end: usize },

    #[error(
        "lines {start}-{end} map to buffer lines {buf_start}-{buf_end}, outside a buffer of {len} lines"
    )]
    OutOfBounds {
        start: usize,
        end: usize,
        buf_start: isize,
        buf_end: isize,
        len: usize,
    },

    #[error(
        "insertion after line {line} maps to buffer line {buf_line}, outside a buffer of {len} lines"
    )]
    InsertOutOfBounds {
        line: usize,
        buf_line: isize,
        len: usize,
    },

    #[error(
        "edit at line {line} does not come after the previous edit ending at line {watermark}"
    )]
    OutOfOrder { line: usize, watermark: usize },

    #[error(
        "buffer lines {buf_start}-{buf_end} no longer hold the expected text (found {found:?})"
    )]
    Conflict {
        buf_start: usize,
        buf_end: usize,
        found: String,
    },

    #[error("replacement text is empty")]
    EmptyReplacement,
}

/// Where an op landed in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedPatch {
    /// First buffer line (1-indexed) of the new block.
    pub buffer_line: usize,
    pub removed: usize,
    pub inserted: usize,
    pub offset_after: isize,
}

/// Per-file rewrite state: the buffer and the offset bookkeeping.
#[derive(Debug, Clone)]
pub struct RewriteSession {
    /// Each line keeps its own terminator so untouched bytes stay untouched.
    buffer: Vec<String>,
    cumulative_offset: isize,
    /// Last original line touched by an applied op.
    watermark: usize,
    newline: &'static str,
    applied: usize,
}

impl RewriteSession {
    pub fn new(text: &str) -> Self {
        let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
        Self {
            buffer: text.split_inclusive('\n').map(str::to_string).collect(),
            cumulative_offset: 0,
            watermark: 0,
            newline,
            applied: 0,
        }
    }

    /// Current line `L` holds original line `L - cumulative_offset` for every
    /// position after the last applied op.
    pub fn cumulative_offset(&self) -> isize {
        self.cumulative_offset
    }

    pub fn line_count(&self) -> usize {
        self.buffer.len()
    }

    /// Number of ops applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Buffer line `n` (1-indexed) without its terminator.
    pub fn line(&self, n: usize) -> Option<&str> {
        let line = self.buffer.get(n.checked_sub(1)?)?;
        Some(line.trim_end_matches('\n').trim_end_matches('\r'))
    }

    /// Translate an original line number into current-buffer coordinates.
    pub fn translate(&self, original_line: usize) -> isize {
        original_line as isize + self.cumulative_offset
    }

    /// Apply one op. On error the buffer is left exactly as it was.
    pub fn apply(&mut self, op: &PatchOp) -> Result<AppliedPatch, PatchRangeError> {
        if op.replacement_text.lines().next().is_none() {
            return Err(PatchRangeError::EmptyReplacement);
        }

        match op.original_range {
            Some(range) => self.apply_replace(range, op),
            None => self.apply_insert(op),
        }
    }

    fn apply_replace(
        &mut self,
        range: LineSpan,
        op: &PatchOp,
    ) -> Result<AppliedPatch, PatchRangeError> {
        if range.start == 0 || range.end < range.start {
            return Err(PatchRangeError::InvertedRange {
                start: range.start,
                end: range.end,
            });
        }
        if range.start <= self.watermark {
            return Err(PatchRangeError::OutOfOrder {
                line: range.start,
                watermark: self.watermark,
            });
        }

        let buf_start = self.translate(range.start);
        let buf_end = self.translate(range.end);
        if buf_start < 1 || buf_end as usize > self.buffer.len() {
            return Err(PatchRangeError::OutOfBounds {
                start: range.start,
                end: range.end,
                buf_start,
                buf_end,
                len: self.buffer.len(),
            });
        }

        let first = buf_start as usize - 1;
        let last = buf_end as usize - 1;

        if let Some(expected) = &op.expected_before {
            let found = self.buffer[first..=last].concat();
            if !expected.matches(&found) {
                return Err(PatchRangeError::Conflict {
                    buf_start: buf_start as usize,
                    buf_end: buf_end as usize,
                    found,
                });
            }
        }

        let ends_unterminated = last + 1 == self.buffer.len() && !self.buffer[last].ends_with('\n');
        let block = self.block_lines(&op.replacement_text, ends_unterminated);
        let inserted = block.len();
        let removed = range.len();

        self.buffer.splice(first..=last, block);
        self.cumulative_offset += inserted as isize - removed as isize;
        self.watermark = range.end;
        self.applied += 1;

        tracing::trace!(
            lines = %range,
            buffer_line = buf_start,
            removed,
            inserted,
            offset = self.cumulative_offset,
            "replaced lines"
        );

        Ok(AppliedPatch {
            buffer_line: buf_start as usize,
            removed,
            inserted,
            offset_after: self.cumulative_offset,
        })
    }

    fn apply_insert(&mut self, op: &PatchOp) -> Result<AppliedPatch, PatchRangeError> {
        let line = op.insertion_line;
        if line < self.watermark {
            return Err(PatchRangeError::OutOfOrder {
                line,
                watermark: self.watermark,
            });
        }

        let buf_line = self.translate(line);
        if buf_line < 0 || buf_line as usize > self.buffer.len() {
            return Err(PatchRangeError::InsertOutOfBounds {
                line,
                buf_line,
                len: self.buffer.len(),
            });
        }
        let index = buf_line as usize;

        let at_unterminated_end = index == self.buffer.len()
            && self.buffer.last().is_some_and(|l| !l.ends_with('\n'));
        if at_unterminated_end {
            if let Some(last) = self.buffer.last_mut() {
                last.push_str(self.newline);
            }
        }

        let block = self.block_lines(&op.replacement_text, at_unterminated_end);
        let inserted = block.len();

        self.buffer.splice(index..index, block);
        self.cumulative_offset += inserted as isize;
        self.watermark = line;
        self.applied += 1;

        tracing::trace!(
            after_line = line,
            buffer_line = index + 1,
            inserted,
            offset = self.cumulative_offset,
            "inserted lines"
        );

        Ok(AppliedPatch {
            buffer_line: index + 1,
            removed: 0,
            inserted,
            offset_after: self.cumulative_offset,
        })
    }

    fn block_lines(&self, text: &str, unterminated_last: bool) -> Vec<String> {
        let mut lines: Vec<String> = text
            .lines()
            .map(|line| format!("{line}{}", self.newline))
            .collect();
        if unterminated_last {
            if let Some(last) = lines.last_mut() {
                last.truncate(last.len() - self.newline.len());
            }
        }
        lines
    }

    /// The buffer as text.
    pub fn render(&self) -> String {
        self.buffer.concat()
    }

    pub fn into_text(self) -> String {
        self.buffer.concat()
    }
}
