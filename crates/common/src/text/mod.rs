// Plain-text operations and position math.
//
// All offsets and lengths are measured in characters, not bytes, and must
// agree with the unit the server uses. Concurrent edits to overlapping
// regions are not merged here (no OT/CRDT layer); clients applying the same
// operations in the same order converge, clients applying them in different
// orders may not.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::CursorPosition;

/// A plain-text edit operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Insert { position: usize, content: String },
    Delete { position: usize, length: usize },
}

/// Errors produced when an operation does not fit the current text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("position {position} is past the end of the text (length {len})")]
    PositionOutOfBounds { position: usize, len: usize },
    #[error("delete of {length} chars at {position} overruns the text (length {len})")]
    RangeOutOfBounds { position: usize, length: usize, len: usize },
}

impl Operation {
    /// The character offset the operation targets.
    pub fn position(&self) -> usize {
        match self {
            Self::Insert { position, .. } | Self::Delete { position, .. } => *position,
        }
    }

    /// Apply the operation to `text`, returning the new text.
    ///
    /// `position` must satisfy `position <= char count` at apply time.
    pub fn apply(&self, text: &str) -> Result<String, OperationError> {
        let len = text.chars().count();
        match self {
            Self::Insert { position, content } => {
                let at = byte_at_char(text, *position)
                    .ok_or(OperationError::PositionOutOfBounds { position: *position, len })?;
                let mut out = String::with_capacity(text.len() + content.len());
                out.push_str(&text[..at]);
                out.push_str(content);
                out.push_str(&text[at..]);
                Ok(out)
            }
            Self::Delete { position, length } => {
                let start = byte_at_char(text, *position)
                    .ok_or(OperationError::PositionOutOfBounds { position: *position, len })?;
                let end = byte_at_char(text, position + length).ok_or(
                    OperationError::RangeOutOfBounds {
                        position: *position,
                        length: *length,
                        len,
                    },
                )?;
                let mut out = String::with_capacity(text.len());
                out.push_str(&text[..start]);
                out.push_str(&text[end..]);
                Ok(out)
            }
        }
    }
}

/// Apply a sequence of operations in order.
pub fn apply_all(text: &str, operations: &[Operation]) -> Result<String, OperationError> {
    let mut current = text.to_string();
    for op in operations {
        current = op.apply(&current)?;
    }
    Ok(current)
}

/// Byte index of the `index`-th character; `Some(text.len())` when `index`
/// equals the character count, `None` past the end.
fn byte_at_char(text: &str, index: usize) -> Option<usize> {
    let mut count = 0;
    for (byte, _) in text.char_indices() {
        if count == index {
            return Some(byte);
        }
        count += 1;
    }
    (count == index).then_some(text.len())
}

/// Structural (line, column) position of a flat character offset.
///
/// Offsets past the end of the text clamp to the final position.
pub fn offset_to_position(text: &str, offset: usize) -> CursorPosition {
    let mut line = 0u32;
    let mut column = 0u32;
    for ch in text.chars().take(offset) {
        if ch == '\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    CursorPosition { line, column }
}

/// Editor footer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentStats {
    pub words: usize,
    pub chars: usize,
    pub lines: usize,
}

/// Word, character, and line counts for a document.
pub fn stats(text: &str) -> DocumentStats {
    DocumentStats {
        words: text.split_whitespace().count(),
        chars: text.chars().count(),
        lines: text.split('\n').count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Insert ──────────────────────────────────────────────────────

    #[test]
    fn insert_into_empty_text() {
        let op = Operation::Insert { position: 0, content: "hi".into() };
        assert_eq!(op.apply("").expect("insert should apply"), "hi");
    }

    #[test]
    fn insert_in_the_middle() {
        let op = Operation::Insert { position: 5, content: ", there".into() };
        assert_eq!(op.apply("hello world").expect("insert should apply"), "hello, there world");
    }

    #[test]
    fn insert_at_the_end() {
        let op = Operation::Insert { position: 5, content: "!".into() };
        assert_eq!(op.apply("hello").expect("insert should apply"), "hello!");
    }

    #[test]
    fn insert_past_end_is_rejected() {
        let op = Operation::Insert { position: 6, content: "x".into() };
        let err = op.apply("hello").expect_err("insert past end should fail");
        assert_eq!(err, OperationError::PositionOutOfBounds { position: 6, len: 5 });
    }

    // ── Delete ──────────────────────────────────────────────────────

    #[test]
    fn delete_from_the_middle() {
        let op = Operation::Delete { position: 5, length: 6 };
        assert_eq!(op.apply("hello, world").expect("delete should apply"), "hellod");
    }

    #[test]
    fn delete_of_whole_text() {
        let op = Operation::Delete { position: 0, length: 5 };
        assert_eq!(op.apply("hello").expect("delete should apply"), "");
    }

    #[test]
    fn delete_overrunning_end_is_rejected() {
        let op = Operation::Delete { position: 3, length: 10 };
        let err = op.apply("hello").expect_err("overrun should fail");
        assert_eq!(err, OperationError::RangeOutOfBounds { position: 3, length: 10, len: 5 });
    }

    // ── Character offsets, not bytes ────────────────────────────────

    #[test]
    fn offsets_count_characters_not_bytes() {
        // "héllo" is 6 bytes but 5 chars; position 2 means after 'é'.
        let op = Operation::Insert { position: 2, content: "X".into() };
        assert_eq!(op.apply("héllo").expect("insert should apply"), "héXllo");

        let op = Operation::Delete { position: 1, length: 1 };
        assert_eq!(op.apply("héllo").expect("delete should apply"), "hllo");
    }

    // ── apply_all ───────────────────────────────────────────────────

    #[test]
    fn apply_all_runs_in_order() {
        let ops = vec![
            Operation::Insert { position: 0, content: "hello".into() },
            Operation::Insert { position: 5, content: " world".into() },
            Operation::Delete { position: 0, length: 6 },
        ];
        assert_eq!(apply_all("", &ops).expect("sequence should apply"), "world");
    }

    #[test]
    fn apply_all_stops_on_first_bad_operation() {
        let ops = vec![
            Operation::Insert { position: 0, content: "hi".into() },
            Operation::Delete { position: 9, length: 1 },
        ];
        assert!(apply_all("", &ops).is_err());
    }

    // ── offset_to_position ──────────────────────────────────────────

    #[test]
    fn position_on_first_line() {
        assert_eq!(offset_to_position("hello", 3), CursorPosition { line: 0, column: 3 });
    }

    #[test]
    fn position_after_newlines() {
        let text = "one\ntwo\nthree";
        assert_eq!(offset_to_position(text, 4), CursorPosition { line: 1, column: 0 });
        assert_eq!(offset_to_position(text, 6), CursorPosition { line: 1, column: 2 });
        assert_eq!(offset_to_position(text, 13), CursorPosition { line: 2, column: 5 });
    }

    #[test]
    fn position_clamps_past_end() {
        assert_eq!(offset_to_position("ab", 100), CursorPosition { line: 0, column: 2 });
    }

    // ── stats ───────────────────────────────────────────────────────

    #[test]
    fn stats_counts_words_chars_lines() {
        let s = stats("one two\nthree");
        assert_eq!(s.words, 3);
        assert_eq!(s.chars, 13);
        assert_eq!(s.lines, 2);
    }

    #[test]
    fn stats_of_empty_text() {
        let s = stats("");
        assert_eq!(s.words, 0);
        assert_eq!(s.chars, 0);
        assert_eq!(s.lines, 1);
    }
}
