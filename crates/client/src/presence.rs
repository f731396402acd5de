// Presence/cursor broadcasting.
//
// Local caret and selection changes are throttled to one emission per
// interval; held positions are flushed after changes settle, so the final
// position always goes out. Remote presence lives in the room snapshot as
// the last received value per participant and is pruned only by
// participant-left — presence never expires on its own.

use chrono::{DateTime, Duration, Utc};

use livedraft_common::text::offset_to_position;
use livedraft_common::types::{CursorPosition, SelectionRange};

const DEFAULT_MIN_INTERVAL_MS: i64 = 150;

/// A presence emission due on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEmit {
    Cursor(CursorPosition),
    Selection(SelectionRange),
}

/// Throttles local cursor/selection broadcasts.
#[derive(Debug)]
pub struct PresenceBroadcaster {
    min_interval: Duration,
    last_emit_at: Option<DateTime<Utc>>,
    pending_cursor: Option<CursorPosition>,
    pending_selection: Option<SelectionRange>,
}

impl PresenceBroadcaster {
    pub fn new() -> Self {
        Self::with_min_interval_ms(DEFAULT_MIN_INTERVAL_MS)
    }

    pub fn with_min_interval_ms(ms: i64) -> Self {
        Self {
            min_interval: Duration::milliseconds(ms),
            last_emit_at: None,
            pending_cursor: None,
            pending_selection: None,
        }
    }

    /// The local caret moved to `offset` in `text`.
    ///
    /// Returns the emission if the throttle window allows it; otherwise the
    /// position is held for `flush`.
    pub fn cursor_moved(
        &mut self,
        text: &str,
        offset: usize,
        now: DateTime<Utc>,
    ) -> Option<PresenceEmit> {
        let position = offset_to_position(text, offset);
        if self.ready(now) {
            self.mark_emitted(now);
            Some(PresenceEmit::Cursor(position))
        } else {
            self.pending_cursor = Some(position);
            None
        }
    }

    /// The local selection spans `start..end` (character offsets).
    ///
    /// The cursor always reflects the selection start; a range is emitted
    /// only when the selection is not collapsed.
    pub fn selection_changed(
        &mut self,
        text: &str,
        start: usize,
        end: usize,
        now: DateTime<Utc>,
    ) -> Vec<PresenceEmit> {
        let cursor = offset_to_position(text, start);
        let range = (start != end).then(|| SelectionRange {
            start: cursor,
            end: offset_to_position(text, end),
        });

        if self.ready(now) {
            self.mark_emitted(now);
            let mut emits = vec![PresenceEmit::Cursor(cursor)];
            emits.extend(range.map(PresenceEmit::Selection));
            emits
        } else {
            self.pending_cursor = Some(cursor);
            self.pending_selection = range;
            Vec::new()
        }
    }

    /// Emit any held positions once the throttle window has passed.
    ///
    /// Call after input settles; this is what guarantees eventual delivery
    /// of the final position.
    pub fn flush(&mut self, now: DateTime<Utc>) -> Vec<PresenceEmit> {
        if !self.ready(now) {
            return Vec::new();
        }
        let mut emits = Vec::new();
        if let Some(cursor) = self.pending_cursor.take() {
            emits.push(PresenceEmit::Cursor(cursor));
        }
        if let Some(selection) = self.pending_selection.take() {
            emits.push(PresenceEmit::Selection(selection));
        }
        if !emits.is_empty() {
            self.mark_emitted(now);
        }
        emits
    }

    pub fn has_pending(&self) -> bool {
        self.pending_cursor.is_some() || self.pending_selection.is_some()
    }

    fn ready(&self, now: DateTime<Utc>) -> bool {
        self.last_emit_at.is_none_or(|at| now - at >= self.min_interval)
    }

    fn mark_emitted(&mut self, now: DateTime<Utc>) {
        self.last_emit_at = Some(now);
        self.pending_cursor = None;
        self.pending_selection = None;
    }
}

impl Default for PresenceBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
