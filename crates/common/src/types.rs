// Core domain types shared across all LiveDraft crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A live bus connection. Created on connect, destroyed on disconnect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub connection_id: Uuid,
    pub user_id: String,
    pub display_name: String,
}

/// What a room collaborates on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Document,
    Media,
    Chat,
}

/// A logical collaboration channel: one document, media item, or chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoomId {
    pub kind: RoomKind,
    pub id: String,
}

impl RoomId {
    pub fn document(id: impl Into<String>) -> Self {
        Self { kind: RoomKind::Document, id: id.into() }
    }

    pub fn media(id: impl Into<String>) -> Self {
        Self { kind: RoomKind::Media, id: id.into() }
    }

    pub fn chat(id: impl Into<String>) -> Self {
        Self { kind: RoomKind::Chat, id: id.into() }
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            RoomKind::Document => "document",
            RoomKind::Media => "media",
            RoomKind::Chat => "chat",
        };
        write!(f, "{kind}:{}", self.id)
    }
}

/// A member of a room.
///
/// Rosters are keyed by `user_id`: a room holds at most one entry per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_color: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionRange>,
}

impl Participant {
    /// A participant as it appears in a join intent: online, no ephemeral state yet.
    pub fn joining(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            user_color: None,
            is_online: true,
            last_seen: None,
            cursor: None,
            selection: None,
        }
    }
}

/// Structural position of a flat character offset: line and column, 0-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

/// A selection between two structural positions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionRange {
    pub start: CursorPosition,
    pub end: CursorPosition,
}

/// A comment on a media item. Immutable once confirmed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub media_id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Percent-based coordinates of an annotation on the media surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnnotationCoordinates {
    pub x: f64,
    pub y: f64,
}

/// A spatial annotation on a media item, with an optional playback
/// timestamp for video. Immutable once confirmed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    #[serde(rename = "_id")]
    pub id: String,
    pub media_id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub coordinates: AnnotationCoordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// One direct message between two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// One side of a private chat as shown in the chat list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatParticipant {
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// A private chat summary as delivered by `chat_list_update`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub participants: Vec<ChatParticipant>,
    pub other_participant: ChatParticipant,
    #[serde(default)]
    pub last_message: Option<ChatMessage>,
    #[serde(default)]
    pub unread_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_display_includes_kind() {
        assert_eq!(RoomId::document("d1").to_string(), "document:d1");
        assert_eq!(RoomId::media("m2").to_string(), "media:m2");
        assert_eq!(RoomId::chat("c3").to_string(), "chat:c3");
    }

    #[test]
    fn room_ids_hash_by_kind_and_id() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(RoomId::document("x"));
        set.insert(RoomId::media("x"));
        set.insert(RoomId::document("x"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn participant_serializes_with_camel_case_fields() {
        let p = Participant::joining("u1", "Alice");
        let value = serde_json::to_value(&p).expect("participant should serialize");
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["username"], "Alice");
        assert_eq!(value["isOnline"], true);
        assert!(value.get("cursor").is_none());
    }

    #[test]
    fn comment_round_trips_with_mongo_style_id() {
        let json = r#"{
            "_id": "c1",
            "media_id": "m1",
            "user_id": "u1",
            "username": "Alice",
            "text": "nice",
            "createdAt": "2026-01-01T00:00:00Z"
        }"#;
        let comment: Comment = serde_json::from_str(json).expect("comment should parse");
        assert_eq!(comment.id, "c1");
        let back = serde_json::to_value(&comment).expect("comment should serialize");
        assert_eq!(back["_id"], "c1");
        assert_eq!(back["createdAt"], "2026-01-01T00:00:00Z");
    }

    #[test]
    fn annotation_timestamp_is_optional() {
        let json = r#"{
            "_id": "a1",
            "media_id": "m1",
            "user_id": "u1",
            "username": "Alice",
            "text": "look here",
            "coordinates": {"x": 12.5, "y": 80.0},
            "createdAt": "2026-01-01T00:00:00Z"
        }"#;
        let annotation: Annotation = serde_json::from_str(json).expect("annotation should parse");
        assert!(annotation.timestamp.is_none());
        assert_eq!(annotation.coordinates.x, 12.5);
    }
}
