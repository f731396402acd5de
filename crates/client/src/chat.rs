// Private chat state: direct messages, typing indicators, unread tracking.
//
// Chats are thin consumers of the bus: the server owns delivery and chat
// ids. The local transcript shows outgoing messages immediately under a
// temp id; the server's `new_private_message` echo (ours by sender id, in
// submission order) substitutes the delivered message in place.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::debug;

use livedraft_common::protocol::bus::BusMessage;
use livedraft_common::types::{ChatMessage, ChatSummary};

use crate::optimistic::OptimisticQueue;

/// A typing indicator goes quiet this long after the last keystroke.
pub const TYPING_SETTLE_MS: i64 = 3_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("message text must not be empty")]
    EmptyMessage,
    #[error("no chat is selected")]
    NoChatSelected,
}

/// Local state for the private chat view.
#[derive(Debug)]
pub struct ChatState {
    user_id: String,
    username: String,
    avatar: Option<String>,
    registered: bool,
    /// Chat list as last delivered by the server.
    pub chats: Vec<ChatSummary>,
    /// Transcript of the selected chat.
    pub messages: Vec<ChatMessage>,
    /// Usernames currently typing at us.
    pub typing_users: BTreeSet<String>,
    selected_chat: Option<String>,
    queue: OptimisticQueue,
    typing_active: bool,
    last_keystroke_at: Option<DateTime<Utc>>,
}

impl ChatState {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            avatar: None,
            registered: false,
            chats: Vec::new(),
            messages: Vec::new(),
            typing_users: BTreeSet::new(),
            selected_chat: None,
            queue: OptimisticQueue::new(),
            typing_active: false,
            last_keystroke_at: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Whether `join_success` has arrived.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn selected_chat(&self) -> Option<&str> {
        self.selected_chat.as_deref()
    }

    /// The registration intent to send after connecting.
    pub fn join_message(&self) -> BusMessage {
        BusMessage::JoinPrivateChat {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            avatar: self.avatar.clone(),
        }
    }

    /// Select a chat and load its history; returns the read receipt to emit.
    pub fn select_chat(&mut self, chat_id: impl Into<String>, history: Vec<ChatMessage>) -> BusMessage {
        let chat_id = chat_id.into();
        self.selected_chat = Some(chat_id.clone());
        self.messages = history;
        BusMessage::MarkMessagesRead { chat_id, user_id: self.user_id.clone() }
    }

    /// Stage an outgoing message and produce the emissions for it.
    ///
    /// The temp message lands in the transcript immediately; the server
    /// echo substitutes it. Empty text is rejected before anything is sent.
    pub fn send_message(
        &mut self,
        receiver_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<BusMessage>, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let chat_id = self.selected_chat.clone().ok_or(ChatError::NoChatSelected)?;

        let temp_id = self.queue.stage();
        self.messages.push(ChatMessage {
            id: temp_id,
            chat_id,
            sender_id: self.user_id.clone(),
            sender_username: self.username.clone(),
            message: text.to_string(),
            read: false,
            created_at: now,
        });

        let mut emits = vec![BusMessage::SendPrivateMessage {
            sender_id: self.user_id.clone(),
            sender_username: self.username.clone(),
            receiver_id: receiver_id.to_string(),
            message: text.to_string(),
            avatar: self.avatar.clone(),
        }];
        emits.extend(self.stop_typing(receiver_id));
        Ok(emits)
    }

    /// A keystroke in the compose box; returns the typing emission.
    pub fn keystroke(&mut self, receiver_id: &str, now: DateTime<Utc>) -> BusMessage {
        self.typing_active = true;
        self.last_keystroke_at = Some(now);
        self.typing_message(receiver_id, true)
    }

    /// Emit `is_typing: false` once the settle window has passed.
    pub fn tick_typing(&mut self, receiver_id: &str, now: DateTime<Utc>) -> Option<BusMessage> {
        if !self.typing_active {
            return None;
        }
        let settled = self
            .last_keystroke_at
            .is_none_or(|at| now - at >= Duration::milliseconds(TYPING_SETTLE_MS));
        settled.then(|| {
            self.typing_active = false;
            self.typing_message(receiver_id, false)
        })
    }

    /// Explicitly stop the typing indicator (e.g. on send).
    pub fn stop_typing(&mut self, receiver_id: &str) -> Option<BusMessage> {
        self.typing_active.then(|| {
            self.typing_active = false;
            self.typing_message(receiver_id, false)
        })
    }

    /// Apply one inbound bus message. Returns true when state changed.
    pub fn apply(&mut self, msg: &BusMessage) -> bool {
        match msg {
            BusMessage::JoinSuccess => {
                self.registered = true;
                true
            }

            BusMessage::NewPrivateMessage(message) => {
                if message.sender_id == self.user_id {
                    // Our own echo: substitute the oldest pending temp
                    // message, in submission order.
                    if let Some(index) = self
                        .messages
                        .iter()
                        .position(|m| OptimisticQueue::is_temp_id(&m.id))
                    {
                        let temp_id = self.messages[index].id.clone();
                        if self
                            .queue
                            .confirm(&mut self.messages, &temp_id, message.clone())
                            .is_err()
                        {
                            debug!(%temp_id, "echo for a message we no longer track, ignoring");
                        }
                        return true;
                    }
                    return false;
                }
                if self.selected_chat.as_deref() == Some(message.chat_id.as_str()) {
                    self.messages.push(message.clone());
                    return true;
                }
                // Message for another chat: reflected in unread counts via
                // the next chat_list_update.
                false
            }

            BusMessage::ChatListUpdate(chats) => {
                self.chats = chats.clone();
                true
            }

            BusMessage::UserStatusUpdate { user_id, is_online, last_seen } => {
                let mut changed = false;
                for chat in &mut self.chats {
                    if chat.other_participant.user_id == *user_id {
                        chat.other_participant.is_online = *is_online;
                        chat.other_participant.last_seen = *last_seen;
                        changed = true;
                    }
                }
                changed
            }

            BusMessage::UserTyping { sender_username, is_typing, .. } => {
                if *is_typing {
                    self.typing_users.insert(sender_username.clone())
                } else {
                    self.typing_users.remove(sender_username)
                }
            }

            _ => false,
        }
    }

    /// Unread messages across all chats, per the last chat list delivery.
    pub fn total_unread(&self) -> u32 {
        self.chats.iter().map(|chat| chat.unread_count).sum()
    }

    /// Transport lost: registration is implicitly gone, indicators reset.
    pub fn handle_disconnect(&mut self) {
        self.registered = false;
        self.typing_active = false;
        self.typing_users.clear();
    }

    fn typing_message(&self, receiver_id: &str, is_typing: bool) -> BusMessage {
        BusMessage::UserTyping {
            sender_id: self.user_id.clone(),
            sender_username: self.username.clone(),
            receiver_id: Some(receiver_id.to_string()),
            is_typing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use livedraft_common::types::ChatParticipant;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn state() -> ChatState {
        ChatState::new("u-local", "Alice")
    }

    fn delivered(id: &str, chat_id: &str, sender_id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            sender_username: "Someone".into(),
            message: text.into(),
            read: false,
            created_at: at(0),
        }
    }

    fn participant(user_id: &str) -> ChatParticipant {
        ChatParticipant {
            user_id: user_id.into(),
            username: user_id.into(),
            avatar: None,
            is_online: true,
            last_seen: None,
        }
    }

    fn summary(id: &str, other: &str, unread: u32) -> ChatSummary {
        ChatSummary {
            id: id.into(),
            participants: vec![participant("u-local"), participant(other)],
            other_participant: participant(other),
            last_message: None,
            unread_count: unread,
        }
    }

    // ── Registration ────────────────────────────────────────────────

    #[test]
    fn join_success_marks_registered() {
        let mut chat = state();
        assert!(!chat.is_registered());
        assert!(chat.apply(&BusMessage::JoinSuccess));
        assert!(chat.is_registered());
    }

    // ── Selecting and reading ───────────────────────────────────────

    #[test]
    fn select_chat_emits_read_receipt() {
        let mut chat = state();
        let receipt = chat.select_chat("c1", vec![delivered("m1", "c1", "u-bob", "hi")]);
        assert_eq!(
            receipt,
            BusMessage::MarkMessagesRead { chat_id: "c1".into(), user_id: "u-local".into() }
        );
        assert_eq!(chat.messages.len(), 1);
    }

    // ── Sending with optimistic echo reconciliation ─────────────────

    #[test]
    fn send_stages_a_temp_message() {
        let mut chat = state();
        chat.select_chat("c1", vec![]);

        let emits = chat.send_message("u-bob", "hey", at(0)).expect("send");
        assert_eq!(chat.messages.len(), 1);
        assert!(OptimisticQueue::is_temp_id(&chat.messages[0].id));
        assert!(matches!(emits[0], BusMessage::SendPrivateMessage { .. }));
    }

    #[test]
    fn own_echo_substitutes_the_temp_message() {
        let mut chat = state();
        chat.select_chat("c1", vec![]);
        chat.send_message("u-bob", "hey", at(0)).expect("send");

        let echo = BusMessage::NewPrivateMessage(delivered("m9", "c1", "u-local", "hey"));
        assert!(chat.apply(&echo));

        assert_eq!(chat.messages.len(), 1, "echo must substitute, not append");
        assert_eq!(chat.messages[0].id, "m9");
    }

    #[test]
    fn echoes_reconcile_in_submission_order() {
        let mut chat = state();
        chat.select_chat("c1", vec![]);
        chat.send_message("u-bob", "one", at(0)).expect("send one");
        chat.send_message("u-bob", "two", at(10)).expect("send two");

        chat.apply(&BusMessage::NewPrivateMessage(delivered("m1", "c1", "u-local", "one")));
        chat.apply(&BusMessage::NewPrivateMessage(delivered("m2", "c1", "u-local", "two")));

        let ids: Vec<&str> = chat.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn empty_message_is_rejected_before_any_send() {
        let mut chat = state();
        chat.select_chat("c1", vec![]);
        assert_eq!(chat.send_message("u-bob", "   ", at(0)), Err(ChatError::EmptyMessage));
        assert!(chat.messages.is_empty());
    }

    #[test]
    fn incoming_message_for_selected_chat_is_appended() {
        let mut chat = state();
        chat.select_chat("c1", vec![]);
        assert!(chat.apply(&BusMessage::NewPrivateMessage(delivered("m1", "c1", "u-bob", "yo"))));
        assert_eq!(chat.messages.len(), 1);
    }

    #[test]
    fn incoming_message_for_other_chat_is_not_appended() {
        let mut chat = state();
        chat.select_chat("c1", vec![]);
        assert!(!chat.apply(&BusMessage::NewPrivateMessage(delivered("m1", "c2", "u-bob", "yo"))));
        assert!(chat.messages.is_empty());
    }

    // ── Chat list and status ────────────────────────────────────────

    #[test]
    fn chat_list_update_replaces_chats_and_counts_unread() {
        let mut chat = state();
        chat.apply(&BusMessage::ChatListUpdate(vec![
            summary("c1", "u-bob", 2),
            summary("c2", "u-eve", 1),
        ]));
        assert_eq!(chat.chats.len(), 2);
        assert_eq!(chat.total_unread(), 3);
    }

    #[test]
    fn status_update_touches_matching_chats_only() {
        let mut chat = state();
        chat.apply(&BusMessage::ChatListUpdate(vec![
            summary("c1", "u-bob", 0),
            summary("c2", "u-eve", 0),
        ]));

        let changed = chat.apply(&BusMessage::UserStatusUpdate {
            user_id: "u-bob".into(),
            is_online: false,
            last_seen: Some(at(500)),
        });
        assert!(changed);
        assert!(!chat.chats[0].other_participant.is_online);
        assert!(chat.chats[1].other_participant.is_online);
    }

    // ── Typing ──────────────────────────────────────────────────────

    #[test]
    fn keystroke_emits_typing_start() {
        let mut chat = state();
        let msg = chat.keystroke("u-bob", at(0));
        match msg {
            BusMessage::UserTyping { receiver_id, is_typing, .. } => {
                assert_eq!(receiver_id.as_deref(), Some("u-bob"));
                assert!(is_typing);
            }
            other => panic!("expected UserTyping, got {other:?}"),
        }
    }

    #[test]
    fn typing_settles_after_the_window() {
        let mut chat = state();
        chat.keystroke("u-bob", at(0));

        assert!(chat.tick_typing("u-bob", at(1_000)).is_none());

        let stop = chat.tick_typing("u-bob", at(3_500)).expect("settled");
        match stop {
            BusMessage::UserTyping { is_typing, .. } => assert!(!is_typing),
            other => panic!("expected UserTyping, got {other:?}"),
        }
        assert!(chat.tick_typing("u-bob", at(10_000)).is_none(), "stop is emitted once");
    }

    #[test]
    fn another_keystroke_extends_the_window() {
        let mut chat = state();
        chat.keystroke("u-bob", at(0));
        chat.keystroke("u-bob", at(2_000));
        assert!(chat.tick_typing("u-bob", at(3_500)).is_none());
        assert!(chat.tick_typing("u-bob", at(5_200)).is_some());
    }

    #[test]
    fn send_stops_the_typing_indicator() {
        let mut chat = state();
        chat.select_chat("c1", vec![]);
        chat.keystroke("u-bob", at(0));

        let emits = chat.send_message("u-bob", "hey", at(100)).expect("send");
        assert_eq!(emits.len(), 2);
        assert!(matches!(
            emits[1],
            BusMessage::UserTyping { is_typing: false, .. }
        ));
    }

    #[test]
    fn remote_typing_tracks_usernames() {
        let mut chat = state();
        let start = BusMessage::UserTyping {
            sender_id: "u-bob".into(),
            sender_username: "Bob".into(),
            receiver_id: None,
            is_typing: true,
        };
        assert!(chat.apply(&start));
        assert!(chat.typing_users.contains("Bob"));

        let stop = BusMessage::UserTyping {
            sender_id: "u-bob".into(),
            sender_username: "Bob".into(),
            receiver_id: None,
            is_typing: false,
        };
        assert!(chat.apply(&stop));
        assert!(chat.typing_users.is_empty());
    }
}
