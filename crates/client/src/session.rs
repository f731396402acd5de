// Top-level sync client: one connection, many rooms.
//
// Data flow: user action → optimistic apply (temp record) → bus emit →
// [server ack or broadcast] → remote event reducer → subscriber re-render.
// Everything is single-threaded and event-driven: state changes happen on a
// local call or inside `pump`, which processes inbound bus messages one at
// a time in arrival order. The connection object is owned here and passed
// nowhere else — there is no process-global socket.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use livedraft_common::protocol::bus::BusMessage;
use livedraft_common::text::Operation;
use livedraft_common::types::{
    Annotation, AnnotationCoordinates, Comment, Participant, RoomId, RoomKind,
};

use crate::api::ValidationError;
use crate::chat::ChatState;
use crate::connection::{BusTransport, ConnectionManager, ConnectionState};
use crate::optimistic::OptimisticQueue;
use crate::presence::{PresenceBroadcaster, PresenceEmit};
use crate::reducer::{reduce, RoomEvent, RoomSnapshot};
use crate::room::{JoinAction, LeaveAction, RoomPhase, RoomTracker};
use crate::subscription::{SubscriptionGuard, SubscriptionSet};

/// A room-scoped change delivered to view subscribers. Views re-read the
/// room snapshot; the event says what happened, not what to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomUpdate {
    pub room: RoomId,
    pub event: RoomEvent,
}

/// A user-visible failure scoped to one action or room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomError {
    pub room: Option<RoomId>,
    pub message: String,
}

/// The sync client for one authenticated user.
pub struct SyncClient<T: BusTransport> {
    connection: ConnectionManager<T>,
    rooms: RoomTracker,
    snapshots: HashMap<RoomId, RoomSnapshot>,
    queue: OptimisticQueue,
    presence: PresenceBroadcaster,
    chat: ChatState,
    updates: SubscriptionSet<RoomUpdate>,
    errors: SubscriptionSet<RoomError>,
}

impl<T: BusTransport> SyncClient<T> {
    pub fn new(connection: ConnectionManager<T>) -> Self {
        let identity = connection.identity().clone();
        Self {
            connection,
            rooms: RoomTracker::new(),
            snapshots: HashMap::new(),
            queue: OptimisticQueue::new(),
            presence: PresenceBroadcaster::new(),
            chat: ChatState::new(identity.user_id, identity.display_name),
            updates: SubscriptionSet::new(),
            errors: SubscriptionSet::new(),
        }
    }

    pub fn with_presence_interval_ms(mut self, ms: i64) -> Self {
        self.presence = PresenceBroadcaster::with_min_interval_ms(ms);
        self
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn rooms(&self) -> &RoomTracker {
        &self.rooms
    }

    pub fn chat(&self) -> &ChatState {
        &self.chat
    }

    pub fn chat_mut(&mut self) -> &mut ChatState {
        &mut self.chat
    }

    pub fn snapshot(&self, room: &RoomId) -> Option<&RoomSnapshot> {
        self.snapshots.get(room)
    }

    fn local_user_id(&self) -> String {
        self.connection.identity().user_id.clone()
    }

    // ── Connection lifecycle ────────────────────────────────────────

    pub fn connect(&mut self) -> Result<ConnectionState> {
        self.connection.connect()
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
        self.drop_memberships();
    }

    /// Observe room changes. Dropping the guard deregisters the handler.
    pub fn on_room_update(&self, handler: impl FnMut(&RoomUpdate) + 'static) -> SubscriptionGuard {
        self.updates.subscribe(handler)
    }

    /// Observe action-scoped failures.
    pub fn on_room_error(&self, handler: impl FnMut(&RoomError) + 'static) -> SubscriptionGuard {
        self.errors.subscribe(handler)
    }

    // ── Room membership ─────────────────────────────────────────────

    pub fn join_document(&mut self, document_id: &str) -> Result<()> {
        self.join(RoomId::document(document_id))
    }

    pub fn leave_document(&mut self, document_id: &str) -> Result<()> {
        self.leave(RoomId::document(document_id))
    }

    pub fn join_media(&mut self, media_id: &str) -> Result<()> {
        self.join(RoomId::media(media_id))
    }

    pub fn leave_media(&mut self, media_id: &str) -> Result<()> {
        self.leave(RoomId::media(media_id))
    }

    /// Register for private chat delivery.
    pub fn join_chat(&mut self) -> Result<()> {
        self.join(RoomId::chat(self.local_user_id()))
    }

    fn join(&mut self, room: RoomId) -> Result<()> {
        if !self.connection.is_connected() {
            return Err(anyhow!("cannot join {room}: not connected"));
        }
        match self.rooms.begin_join(room.clone()) {
            // Already a member (or becoming one): no second registration.
            JoinAction::AlreadyMember => Ok(()),
            JoinAction::SendIntent => {
                self.snapshots.entry(room.clone()).or_default();
                let intent = self.join_intent(&room);
                self.connection.send(&intent)?;
                // Document joins resolve on `document-joined`, chat on
                // `join_success`. Media joins carry no ack: membership is
                // effective as soon as the intent is sent.
                if room.kind == RoomKind::Media {
                    self.rooms.complete_join(&room, Vec::new(), Utc::now());
                }
                Ok(())
            }
        }
    }

    fn leave(&mut self, room: RoomId) -> Result<()> {
        match self.rooms.begin_leave(&room) {
            LeaveAction::NotJoined => Ok(()),
            LeaveAction::SendIntent => {
                self.snapshots.remove(&room);
                if let Some(intent) = self.leave_intent(&room) {
                    if self.connection.is_connected() {
                        self.connection.send(&intent)?;
                    }
                }
                self.rooms.complete_leave(&room);
                Ok(())
            }
        }
    }

    fn join_intent(&self, room: &RoomId) -> BusMessage {
        let identity = self.connection.identity();
        match room.kind {
            RoomKind::Document => BusMessage::JoinDocument {
                document_id: room.id.clone(),
                user_id: identity.user_id.clone(),
                username: identity.display_name.clone(),
            },
            RoomKind::Media => BusMessage::JoinMedia { media_id: room.id.clone() },
            RoomKind::Chat => self.chat.join_message(),
        }
    }

    fn leave_intent(&self, room: &RoomId) -> Option<BusMessage> {
        let identity = self.connection.identity();
        match room.kind {
            RoomKind::Document => Some(BusMessage::LeaveDocument {
                document_id: room.id.clone(),
                user_id: identity.user_id.clone(),
            }),
            RoomKind::Media => Some(BusMessage::LeaveMedia { media_id: room.id.clone() }),
            // Chat has no leave event; membership lapses with the transport.
            RoomKind::Chat => None,
        }
    }

    // ── Local document edits ────────────────────────────────────────

    /// Apply a local edit: the snapshot changes immediately, then the
    /// operation is announced. The remote echo is skipped by author.
    pub fn apply_local_edit(&mut self, document_id: &str, operation: Operation) -> Result<()> {
        let room = RoomId::document(document_id);
        if self.rooms.phase(&room) != RoomPhase::Joined {
            return Err(anyhow!("cannot edit {room}: not joined"));
        }
        let snapshot =
            self.snapshots.get_mut(&room).ok_or_else(|| anyhow!("no snapshot for {room}"))?;
        snapshot.content = operation.apply(&snapshot.content)?;

        let user_id = self.local_user_id();
        self.connection.send(&BusMessage::DocumentOperation {
            document_id: document_id.to_string(),
            user_id,
            operation,
        })
    }

    // ── Presence broadcasting ───────────────────────────────────────

    pub fn update_cursor(
        &mut self,
        document_id: &str,
        offset: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let room = RoomId::document(document_id);
        let content = self.snapshots.get(&room).map(|s| s.content.as_str()).unwrap_or("");
        let emits: Vec<PresenceEmit> =
            self.presence.cursor_moved(content, offset, now).into_iter().collect();
        self.send_presence(document_id, emits)
    }

    pub fn update_selection(
        &mut self,
        document_id: &str,
        start: usize,
        end: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let room = RoomId::document(document_id);
        let content = self.snapshots.get(&room).map(|s| s.content.as_str()).unwrap_or("");
        let emits = self.presence.selection_changed(content, start, end, now);
        self.send_presence(document_id, emits)
    }

    /// Deliver any throttled final position. Call when input settles.
    pub fn flush_presence(&mut self, document_id: &str, now: DateTime<Utc>) -> Result<()> {
        let emits = self.presence.flush(now);
        self.send_presence(document_id, emits)
    }

    fn send_presence(&mut self, document_id: &str, emits: Vec<PresenceEmit>) -> Result<()> {
        let user_id = self.local_user_id();
        for emit in emits {
            let msg = match emit {
                PresenceEmit::Cursor(cursor_position) => BusMessage::CursorUpdate {
                    document_id: document_id.to_string(),
                    user_id: user_id.clone(),
                    cursor_position,
                },
                PresenceEmit::Selection(selection) => BusMessage::SelectionUpdate {
                    document_id: document_id.to_string(),
                    user_id: user_id.clone(),
                    selection,
                },
            };
            self.connection.send(&msg)?;
        }
        Ok(())
    }

    // ── Optimistic comments and annotations ─────────────────────────

    /// Stage a comment into the media room under a temp id. The caller
    /// submits it to the REST API and then confirms or fails the temp id.
    pub fn stage_comment(
        &mut self,
        media_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }
        let room = RoomId::media(media_id);
        if self.rooms.phase(&room) != RoomPhase::Joined {
            return Err(anyhow!("cannot comment on {room}: not joined"));
        }

        let identity = self.connection.identity().clone();
        let comment = Comment {
            id: self.queue.stage(),
            media_id: media_id.to_string(),
            user_id: identity.user_id,
            username: identity.display_name,
            text: text.to_string(),
            created_at: now,
        };
        let snapshot = self.snapshots.entry(room.clone()).or_default();
        snapshot.comments.push(comment.clone());
        self.updates.emit(&RoomUpdate {
            room,
            event: RoomEvent::CommentAdded { comment: comment.clone() },
        });
        Ok(comment)
    }

    /// The backend accepted the comment: substitute in place and announce
    /// it over the bus so other participants update without a reload.
    pub fn confirm_comment(
        &mut self,
        media_id: &str,
        temp_id: &str,
        confirmed: Comment,
    ) -> Result<()> {
        let room = RoomId::media(media_id);
        let snapshot =
            self.snapshots.get_mut(&room).ok_or_else(|| anyhow!("no snapshot for {room}"))?;
        self.queue.confirm(&mut snapshot.comments, temp_id, confirmed.clone())?;

        self.connection.send(&BusMessage::NewComment {
            media_id: media_id.to_string(),
            comment: confirmed.clone(),
        })?;
        self.updates.emit(&RoomUpdate { room, event: RoomEvent::CommentAdded { comment: confirmed } });
        Ok(())
    }

    /// The backend rejected the comment: roll it back and surface the error.
    pub fn fail_comment(&mut self, media_id: &str, temp_id: &str, reason: &str) -> Result<()> {
        let room = RoomId::media(media_id);
        let snapshot =
            self.snapshots.get_mut(&room).ok_or_else(|| anyhow!("no snapshot for {room}"))?;
        self.queue.fail(&mut snapshot.comments, temp_id)?;
        self.errors.emit(&RoomError { room: Some(room), message: reason.to_string() });
        Ok(())
    }

    /// Stage an annotation into the media room under a temp id.
    pub fn stage_annotation(
        &mut self,
        media_id: &str,
        text: &str,
        coordinates: AnnotationCoordinates,
        timestamp: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Annotation> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyAnnotation.into());
        }
        let room = RoomId::media(media_id);
        if self.rooms.phase(&room) != RoomPhase::Joined {
            return Err(anyhow!("cannot annotate {room}: not joined"));
        }

        let identity = self.connection.identity().clone();
        let annotation = Annotation {
            id: self.queue.stage(),
            media_id: media_id.to_string(),
            user_id: identity.user_id,
            username: identity.display_name,
            text: text.to_string(),
            coordinates,
            timestamp,
            created_at: now,
        };
        let snapshot = self.snapshots.entry(room.clone()).or_default();
        snapshot.annotations.push(annotation.clone());
        self.updates.emit(&RoomUpdate {
            room,
            event: RoomEvent::AnnotationAdded { annotation: annotation.clone() },
        });
        Ok(annotation)
    }

    pub fn confirm_annotation(
        &mut self,
        media_id: &str,
        temp_id: &str,
        confirmed: Annotation,
    ) -> Result<()> {
        let room = RoomId::media(media_id);
        let snapshot =
            self.snapshots.get_mut(&room).ok_or_else(|| anyhow!("no snapshot for {room}"))?;
        self.queue.confirm(&mut snapshot.annotations, temp_id, confirmed.clone())?;

        self.connection.send(&BusMessage::NewAnnotation {
            media_id: media_id.to_string(),
            annotation: confirmed.clone(),
        })?;
        self.updates
            .emit(&RoomUpdate { room, event: RoomEvent::AnnotationAdded { annotation: confirmed } });
        Ok(())
    }

    pub fn fail_annotation(&mut self, media_id: &str, temp_id: &str, reason: &str) -> Result<()> {
        let room = RoomId::media(media_id);
        let snapshot =
            self.snapshots.get_mut(&room).ok_or_else(|| anyhow!("no snapshot for {room}"))?;
        self.queue.fail(&mut snapshot.annotations, temp_id)?;
        self.errors.emit(&RoomError { room: Some(room), message: reason.to_string() });
        Ok(())
    }

    // ── Inbound pump ────────────────────────────────────────────────

    /// Process the next inbound bus message, in arrival order.
    ///
    /// Returns false once the connection is gone; every membership is then
    /// implicitly left and a reconnect must rejoin and resync from scratch.
    pub fn pump(&mut self) -> Result<bool> {
        match self.connection.recv()? {
            Some(msg) => {
                self.dispatch(msg);
                Ok(true)
            }
            None => {
                self.drop_memberships();
                Ok(false)
            }
        }
    }

    fn dispatch(&mut self, msg: BusMessage) {
        match msg {
            BusMessage::DocumentJoined { document_id, active_sessions } => {
                let room = RoomId::document(document_id);
                self.rooms.complete_join(&room, active_sessions.clone(), Utc::now());
                for participant in active_sessions {
                    self.reduce_and_publish(
                        room.clone(),
                        RoomEvent::ParticipantJoined { participant },
                    );
                }
            }

            BusMessage::UserJoinedDocument { document_id, user_id, username, user_color, .. } => {
                let room = RoomId::document(document_id);
                let mut participant = Participant::joining(user_id, username);
                participant.user_color = user_color;
                self.rooms.upsert_participant(&room, participant.clone());
                self.reduce_and_publish(room, RoomEvent::ParticipantJoined { participant });
            }

            BusMessage::UserLeftDocument { document_id, user_id } => {
                let room = RoomId::document(document_id);
                self.rooms.remove_participant(&room, &user_id);
                self.reduce_and_publish(room, RoomEvent::ParticipantLeft { user_id });
            }

            BusMessage::DocumentOperationApplied { document_id, user_id, operation, .. } => {
                let room = RoomId::document(document_id);
                self.reduce_and_publish(room, RoomEvent::OperationApplied { user_id, operation });
            }

            BusMessage::CursorUpdated { document_id, user_id, cursor_position } => {
                let room = RoomId::document(document_id);
                self.reduce_and_publish(
                    room,
                    RoomEvent::CursorUpdated { user_id, position: cursor_position },
                );
            }

            BusMessage::SelectionUpdated { document_id, user_id, selection } => {
                let room = RoomId::document(document_id);
                self.reduce_and_publish(room, RoomEvent::SelectionUpdated { user_id, selection });
            }

            BusMessage::DocumentError { document_id, message } => {
                self.errors.emit(&RoomError { room: document_id.map(RoomId::document), message });
            }

            BusMessage::NewComment { media_id, comment } => {
                let room = RoomId::media(media_id);
                self.reduce_and_publish(room, RoomEvent::CommentAdded { comment });
            }

            BusMessage::NewAnnotation { media_id, annotation } => {
                let room = RoomId::media(media_id);
                self.reduce_and_publish(room, RoomEvent::AnnotationAdded { annotation });
            }

            BusMessage::JoinSuccess => {
                let room = RoomId::chat(self.local_user_id());
                self.rooms.complete_join(&room, Vec::new(), Utc::now());
                self.chat.apply(&BusMessage::JoinSuccess);
            }

            BusMessage::UserStatusUpdate { user_id, is_online, last_seen } => {
                // Status feeds both the chat list and any room roster the
                // user appears in.
                self.chat.apply(&BusMessage::UserStatusUpdate {
                    user_id: user_id.clone(),
                    is_online,
                    last_seen,
                });
                let rooms: Vec<RoomId> = self
                    .snapshots
                    .iter()
                    .filter(|(_, snapshot)| snapshot.participants.contains_key(&user_id))
                    .map(|(room, _)| room.clone())
                    .collect();
                for room in rooms {
                    self.reduce_and_publish(
                        room,
                        RoomEvent::PresenceChanged {
                            user_id: user_id.clone(),
                            is_online,
                            last_seen,
                        },
                    );
                }
            }

            msg @ (BusMessage::NewPrivateMessage(_)
            | BusMessage::ChatListUpdate(_)
            | BusMessage::UserTyping { .. }) => {
                self.chat.apply(&msg);
            }

            BusMessage::Unknown => {
                debug!("ignoring unrecognized bus event");
            }

            // Client-originated events echoed back whole are not expected;
            // treat them like unknown ones.
            other => {
                debug!(?other, "ignoring unexpected inbound event");
            }
        }
    }

    /// Run an event through the pure reducer and notify subscribers.
    /// Events for rooms we are not tracking are dropped.
    fn reduce_and_publish(&mut self, room: RoomId, event: RoomEvent) {
        let Some(snapshot) = self.snapshots.get(&room) else {
            debug!(room = %room, "event for an untracked room, ignoring");
            return;
        };
        let next = reduce(snapshot, &event, &self.connection.identity().user_id);
        self.snapshots.insert(room.clone(), next);
        self.updates.emit(&RoomUpdate { room, event });
    }

    fn drop_memberships(&mut self) {
        self.rooms.handle_disconnect();
        self.snapshots.clear();
        self.chat.handle_disconnect();
    }
}

// ── Autosave ────────────────────────────────────────────────────────

const AUTOSAVE_IDLE_MS: i64 = 2_000;

/// Debounced autosave: the full document is persisted once the editor has
/// been idle long enough. The clock is injected so callers and tests drive
/// time explicitly.
#[derive(Debug)]
pub struct AutosaveTimer {
    idle: Duration,
    dirty_since: Option<DateTime<Utc>>,
}

impl AutosaveTimer {
    pub fn new() -> Self {
        Self::with_idle_ms(AUTOSAVE_IDLE_MS)
    }

    pub fn with_idle_ms(ms: i64) -> Self {
        Self { idle: Duration::milliseconds(ms), dirty_since: None }
    }

    /// An edit happened; (re)start the idle window.
    pub fn mark_dirty(&mut self, now: DateTime<Utc>) {
        self.dirty_since = Some(now);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    /// True once a save is due. Clears the dirty flag.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.dirty_since {
            Some(at) if now - at >= self.idle => {
                self.dirty_since = None;
                true
            }
            _ => false,
        }
    }

    /// An explicit save happened (e.g. ctrl-s); nothing further is due.
    pub fn clear(&mut self) {
        self.dirty_since = None;
    }
}

impl Default for AutosaveTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    #[test]
    fn autosave_fires_after_idle_window() {
        let mut timer = AutosaveTimer::new();
        assert!(!timer.take_due(at(0)));

        timer.mark_dirty(at(0));
        assert!(!timer.take_due(at(1_000)));
        assert!(timer.take_due(at(2_500)));
        assert!(!timer.take_due(at(9_000)), "a save is due once per dirty window");
    }

    #[test]
    fn further_edits_restart_the_window() {
        let mut timer = AutosaveTimer::new();
        timer.mark_dirty(at(0));
        timer.mark_dirty(at(1_500));
        assert!(!timer.take_due(at(2_500)));
        assert!(timer.take_due(at(3_600)));
    }

    #[test]
    fn explicit_save_clears_the_window() {
        let mut timer = AutosaveTimer::new();
        timer.mark_dirty(at(0));
        timer.clear();
        assert!(!timer.is_dirty());
        assert!(!timer.take_due(at(10_000)));
    }
}
