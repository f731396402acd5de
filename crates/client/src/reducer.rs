// Remote event reducer: pure state transitions for one room.
//
// Takes the current snapshot and a typed inbound event, returns the next
// snapshot. Self-originated echoes are skipped by author identity — the
// optimistic queue already applied them locally — never by content
// equality, so legitimately identical text from two users is not
// de-duplicated.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::warn;

use livedraft_common::text::Operation;
use livedraft_common::types::{
    Annotation, Comment, CursorPosition, Participant, SelectionRange,
};

/// A typed inbound event scoped to one room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    ParticipantJoined { participant: Participant },
    ParticipantLeft { user_id: String },
    OperationApplied { user_id: String, operation: Operation },
    CursorUpdated { user_id: String, position: CursorPosition },
    SelectionUpdated { user_id: String, selection: SelectionRange },
    CommentAdded { comment: Comment },
    AnnotationAdded { annotation: Annotation },
    PresenceChanged { user_id: String, is_online: bool, last_seen: Option<DateTime<Utc>> },
}

/// Local view state for one room.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomSnapshot {
    pub content: String,
    pub participants: BTreeMap<String, Participant>,
    pub cursors: HashMap<String, CursorPosition>,
    pub selections: HashMap<String, SelectionRange>,
    pub comments: Vec<Comment>,
    pub annotations: Vec<Annotation>,
}

impl RoomSnapshot {
    pub fn with_content(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Self::default() }
    }
}

/// Apply one event to a snapshot, producing the next snapshot.
///
/// `current_user` is the local user id; operations and mutations they
/// originated are echoes and leave the snapshot unchanged. An operation
/// that does not fit the local text (stale offsets from a divergent peer)
/// is logged and skipped rather than corrupting local state.
pub fn reduce(snapshot: &RoomSnapshot, event: &RoomEvent, current_user: &str) -> RoomSnapshot {
    let mut next = snapshot.clone();
    match event {
        RoomEvent::ParticipantJoined { participant } => {
            next.participants.insert(participant.user_id.clone(), participant.clone());
        }

        RoomEvent::ParticipantLeft { user_id } => {
            // A participant absent from the roster must never leave a
            // dangling cursor or selection behind.
            next.participants.remove(user_id);
            next.cursors.remove(user_id);
            next.selections.remove(user_id);
        }

        RoomEvent::OperationApplied { user_id, operation } => {
            if user_id == current_user {
                return next;
            }
            match operation.apply(&next.content) {
                Ok(updated) => next.content = updated,
                Err(error) => {
                    warn!(%error, user_id, "skipping remote operation that does not fit local text");
                }
            }
        }

        RoomEvent::CursorUpdated { user_id, position } => {
            if user_id != current_user {
                next.cursors.insert(user_id.clone(), *position);
            }
        }

        RoomEvent::SelectionUpdated { user_id, selection } => {
            if user_id != current_user {
                next.selections.insert(user_id.clone(), *selection);
            }
        }

        RoomEvent::CommentAdded { comment } => {
            if comment.user_id == current_user {
                return next; // own echo: the optimistic copy is already in the list
            }
            if !next.comments.iter().any(|c| c.id == comment.id) {
                next.comments.push(comment.clone());
            }
        }

        RoomEvent::AnnotationAdded { annotation } => {
            if annotation.user_id == current_user {
                return next;
            }
            if !next.annotations.iter().any(|a| a.id == annotation.id) {
                next.annotations.push(annotation.clone());
            }
        }

        RoomEvent::PresenceChanged { user_id, is_online, last_seen } => {
            if let Some(participant) = next.participants.get_mut(user_id) {
                participant.is_online = *is_online;
                participant.last_seen = *last_seen;
            }
        }
    }
    next
}
