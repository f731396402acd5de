// Room membership tracking.
//
// Per-room phase machine:
//
//   unjoined → joining → joined → leaving → unjoined
//
// with `joined → unjoined` implicitly on transport loss. No membership
// survives a disconnect: a rejoin is a fresh join plus a full resync from
// the server (there is no local operation log to replay).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use livedraft_common::types::{Participant, RoomId};

/// Where a room is in its membership lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Unjoined,
    Joining,
    Joined,
    Leaving,
}

/// What the caller should do with the bus after requesting a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAction {
    /// Send the join intent.
    SendIntent,
    /// Already joined or joining: at most a re-sync, never a second
    /// registration.
    AlreadyMember,
}

/// What the caller should do with the bus after requesting a leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveAction {
    /// Send the leave intent.
    SendIntent,
    /// Not a member; nothing to send.
    NotJoined,
}

/// One tracked room and its roster.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub phase: RoomPhase,
    pub joined_at: Option<DateTime<Utc>>,
    roster: HashMap<String, Participant>,
}

impl Room {
    fn new(id: RoomId) -> Self {
        Self { id, phase: RoomPhase::Unjoined, joined_at: None, roster: HashMap::new() }
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.roster.get(user_id)
    }

    /// The roster, ordered by user id for stable rendering.
    pub fn roster(&self) -> Vec<&Participant> {
        let mut entries: Vec<&Participant> = self.roster.values().collect();
        entries.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        entries
    }

    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }
}

/// Tracks every room this client is (or is becoming) a member of.
#[derive(Debug, Default)]
pub struct RoomTracker {
    rooms: HashMap<RoomId, Room>,
}

impl RoomTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, id: &RoomId) -> RoomPhase {
        self.rooms.get(id).map_or(RoomPhase::Unjoined, |room| room.phase)
    }

    pub fn room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn joined_rooms(&self) -> Vec<&RoomId> {
        let mut ids: Vec<&RoomId> = self
            .rooms
            .values()
            .filter(|room| room.phase == RoomPhase::Joined)
            .map(|room| &room.id)
            .collect();
        ids.sort_by_key(|id| id.to_string());
        ids
    }

    /// Begin joining. A second join for the same room is never a duplicate
    /// registration.
    pub fn begin_join(&mut self, id: RoomId) -> JoinAction {
        let room = self.rooms.entry(id.clone()).or_insert_with(|| Room::new(id));
        match room.phase {
            RoomPhase::Joined | RoomPhase::Joining => JoinAction::AlreadyMember,
            RoomPhase::Unjoined | RoomPhase::Leaving => {
                room.phase = RoomPhase::Joining;
                room.joined_at = None;
                room.roster.clear();
                JoinAction::SendIntent
            }
        }
    }

    /// The server acknowledged the join with the current roster.
    pub fn complete_join(&mut self, id: &RoomId, roster: Vec<Participant>, now: DateTime<Utc>) {
        let Some(room) = self.rooms.get_mut(id) else {
            debug!(room = %id, "join ack for an untracked room, ignoring");
            return;
        };
        room.phase = RoomPhase::Joined;
        room.joined_at = Some(now);
        room.roster.clear();
        for participant in roster {
            room.roster.insert(participant.user_id.clone(), participant);
        }
    }

    /// Insert or replace a roster entry. One entry per user per room.
    pub fn upsert_participant(&mut self, id: &RoomId, participant: Participant) {
        if let Some(room) = self.rooms.get_mut(id) {
            room.roster.insert(participant.user_id.clone(), participant);
        }
    }

    pub fn remove_participant(&mut self, id: &RoomId, user_id: &str) {
        if let Some(room) = self.rooms.get_mut(id) {
            room.roster.remove(user_id);
        }
    }

    /// Begin leaving. Clears local roster state for the room.
    pub fn begin_leave(&mut self, id: &RoomId) -> LeaveAction {
        match self.rooms.get_mut(id) {
            Some(room) if matches!(room.phase, RoomPhase::Joined | RoomPhase::Joining) => {
                room.phase = RoomPhase::Leaving;
                room.roster.clear();
                LeaveAction::SendIntent
            }
            _ => LeaveAction::NotJoined,
        }
    }

    /// The leave round trip finished; the room is gone locally.
    pub fn complete_leave(&mut self, id: &RoomId) {
        self.rooms.remove(id);
    }

    /// Transport lost: every membership is implicitly left.
    pub fn handle_disconnect(&mut self) {
        if !self.rooms.is_empty() {
            debug!(rooms = self.rooms.len(), "dropping all room memberships on disconnect");
        }
        self.rooms.clear();
    }
}
