// Message-bus event types for the LiveDraft realtime protocol.
//
// Every event travels as `{"event": <name>, "data": {...}}`. Wire names are
// preserved verbatim: the document/media family is kebab-case, the private
// chat family is snake_case. Unrecognized event names deserialize to
// `BusMessage::Unknown` so newer servers never break older clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::Operation;
use crate::types::{
    Annotation, ChatMessage, ChatSummary, Comment, CursorPosition, Participant, SelectionRange,
};

/// All events on the LiveDraft message bus, client- and server-originated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum BusMessage {
    // ── Document collaboration ──────────────────────────────────────
    /// Client -> Server: join a document room.
    #[serde(rename = "join-document", rename_all = "camelCase")]
    JoinDocument { document_id: String, user_id: String, username: String },

    /// Client -> Server: leave a document room.
    #[serde(rename = "leave-document", rename_all = "camelCase")]
    LeaveDocument { document_id: String, user_id: String },

    /// Client -> Server: a local edit to broadcast.
    #[serde(rename = "document-operation", rename_all = "camelCase")]
    DocumentOperation { document_id: String, user_id: String, operation: Operation },

    /// Client -> Server: local cursor moved.
    #[serde(rename = "cursor-update", rename_all = "camelCase")]
    CursorUpdate { document_id: String, user_id: String, cursor_position: CursorPosition },

    /// Client -> Server: local selection changed.
    #[serde(rename = "selection-update", rename_all = "camelCase")]
    SelectionUpdate { document_id: String, user_id: String, selection: SelectionRange },

    /// Server -> Client: join acknowledged; the current roster.
    #[serde(rename = "document-joined", rename_all = "camelCase")]
    DocumentJoined { document_id: String, active_sessions: Vec<Participant> },

    /// Server -> Client: another participant joined.
    #[serde(rename = "user-joined-document", rename_all = "camelCase")]
    UserJoinedDocument {
        document_id: String,
        user_id: String,
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_color: Option<String>,
        active_sessions: Vec<Participant>,
    },

    /// Server -> Client: a participant left.
    #[serde(rename = "user-left-document", rename_all = "camelCase")]
    UserLeftDocument { document_id: String, user_id: String },

    /// Server -> Client: an edit was applied to the shared document.
    #[serde(rename = "document-operation-applied", rename_all = "camelCase")]
    DocumentOperationApplied {
        document_id: String,
        user_id: String,
        operation: Operation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<i64>,
    },

    /// Server -> Client: a remote cursor moved.
    #[serde(rename = "cursor-updated", rename_all = "camelCase")]
    CursorUpdated { document_id: String, user_id: String, cursor_position: CursorPosition },

    /// Server -> Client: a remote selection changed.
    #[serde(rename = "selection-updated", rename_all = "camelCase")]
    SelectionUpdated { document_id: String, user_id: String, selection: SelectionRange },

    /// Server -> Client: a room-scoped error.
    #[serde(rename = "document-error", rename_all = "camelCase")]
    DocumentError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_id: Option<String>,
        message: String,
    },

    // ── Media review ────────────────────────────────────────────────
    /// Client -> Server: join a media room.
    #[serde(rename = "join-media", rename_all = "camelCase")]
    JoinMedia { media_id: String },

    /// Client -> Server: leave a media room.
    #[serde(rename = "leave-media", rename_all = "camelCase")]
    LeaveMedia { media_id: String },

    /// Bidirectional: a confirmed comment, announced to the room.
    #[serde(rename = "new-comment", rename_all = "camelCase")]
    NewComment { media_id: String, comment: Comment },

    /// Bidirectional: a confirmed annotation, announced to the room.
    #[serde(rename = "new-annotation", rename_all = "camelCase")]
    NewAnnotation { media_id: String, annotation: Annotation },

    // ── Private chat ────────────────────────────────────────────────
    /// Client -> Server: register for private chat delivery.
    #[serde(rename = "join_private_chat", rename_all = "camelCase")]
    JoinPrivateChat {
        user_id: String,
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar: Option<String>,
    },

    /// Server -> Client: private chat registration acknowledged.
    #[serde(rename = "join_success")]
    JoinSuccess,

    /// Client -> Server: send a direct message.
    #[serde(rename = "send_private_message", rename_all = "camelCase")]
    SendPrivateMessage {
        sender_id: String,
        sender_username: String,
        receiver_id: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar: Option<String>,
    },

    /// Server -> Client: a direct message was delivered.
    #[serde(rename = "new_private_message")]
    NewPrivateMessage(ChatMessage),

    /// Server -> Client: the caller's chat list changed.
    #[serde(rename = "chat_list_update")]
    ChatListUpdate(Vec<ChatSummary>),

    /// Server -> Client: a user's online status changed.
    #[serde(rename = "user_status_update", rename_all = "camelCase")]
    UserStatusUpdate {
        user_id: String,
        is_online: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_seen: Option<DateTime<Utc>>,
    },

    /// Bidirectional: typing indicator. `receiver_id` is set on emit only.
    #[serde(rename = "user_typing", rename_all = "camelCase")]
    UserTyping {
        sender_id: String,
        sender_username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiver_id: Option<String>,
        is_typing: bool,
    },

    /// Client -> Server: messages in a chat were seen.
    #[serde(rename = "mark_messages_read", rename_all = "camelCase")]
    MarkMessagesRead { chat_id: String, user_id: String },

    /// Any event name this client does not know. Forward-compatible no-op.
    #[serde(other)]
    Unknown,
}
