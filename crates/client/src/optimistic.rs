// Optimistic mutation queue.
//
// A local mutation lands in view state immediately under a temporary id and
// is reconciled when the round trip completes:
//
//   pending → confirmed   (temp id substituted by the server-assigned id,
//                          in place — same list position)
//   pending → failed      (entity rolled back out of the list, error
//                          surfaced; no silent retry)
//
// Temp ids are `temp-<n>` with `n` monotonic per session, which gives
// echoes a submission order independent of content. Records never outlive
// the session.

use thiserror::Error;

use livedraft_common::types::{Annotation, ChatMessage, Comment};

/// An entity that can live in a list under a temporary or real id.
pub trait OptimisticEntity {
    fn entity_id(&self) -> &str;
}

impl OptimisticEntity for Comment {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl OptimisticEntity for Annotation {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl OptimisticEntity for ChatMessage {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Round-trip status of one local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Book-keeping for one optimistic mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticRecord {
    pub temp_id: String,
    pub real_id: Option<String>,
    pub status: MutationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("no pending optimistic record for `{0}`")]
    UnknownTempId(String),
    #[error("optimistic entity `{0}` is not in the local list")]
    MissingEntity(String),
}

/// Tracks pending mutations and reconciles them against server results.
#[derive(Debug, Default)]
pub struct OptimisticQueue {
    next_seq: u64,
    records: Vec<OptimisticRecord>,
}

impl OptimisticQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next temporary id in submission order.
    pub fn stage(&mut self) -> String {
        self.next_seq += 1;
        let temp_id = format!("temp-{}", self.next_seq);
        self.records.push(OptimisticRecord {
            temp_id: temp_id.clone(),
            real_id: None,
            status: MutationStatus::Pending,
        });
        temp_id
    }

    /// Substitute the confirmed entity for the temporary one, in place.
    ///
    /// Pure substitution at the same list position — never an append — so
    /// the view neither reorders nor duplicates.
    pub fn confirm<T: OptimisticEntity>(
        &mut self,
        list: &mut Vec<T>,
        temp_id: &str,
        confirmed: T,
    ) -> Result<(), ReconcileError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.temp_id == temp_id && r.status == MutationStatus::Pending)
            .ok_or_else(|| ReconcileError::UnknownTempId(temp_id.to_string()))?;
        let index = list
            .iter()
            .position(|entity| entity.entity_id() == temp_id)
            .ok_or_else(|| ReconcileError::MissingEntity(temp_id.to_string()))?;

        record.real_id = Some(confirmed.entity_id().to_string());
        record.status = MutationStatus::Confirmed;
        list[index] = confirmed;
        Ok(())
    }

    /// Roll the temporary entity back out of the list after a failed round
    /// trip.
    pub fn fail<T: OptimisticEntity>(
        &mut self,
        list: &mut Vec<T>,
        temp_id: &str,
    ) -> Result<(), ReconcileError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.temp_id == temp_id && r.status == MutationStatus::Pending)
            .ok_or_else(|| ReconcileError::UnknownTempId(temp_id.to_string()))?;
        record.status = MutationStatus::Failed;
        list.retain(|entity| entity.entity_id() != temp_id);
        Ok(())
    }

    pub fn record(&self, temp_id: &str) -> Option<&OptimisticRecord> {
        self.records.iter().find(|r| r.temp_id == temp_id)
    }

    pub fn pending_count(&self) -> usize {
        self.records.iter().filter(|r| r.status == MutationStatus::Pending).count()
    }

    /// Whether an id is one of ours-before-confirmation.
    pub fn is_temp_id(id: &str) -> bool {
        id.starts_with("temp-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn comment(id: &str, text: &str) -> Comment {
        Comment {
            id: id.into(),
            media_id: "m1".into(),
            user_id: "u-local".into(),
            username: "Alice".into(),
            text: text.into(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    // ── Staging ─────────────────────────────────────────────────────

    #[test]
    fn stage_allocates_monotonic_temp_ids() {
        let mut queue = OptimisticQueue::new();
        assert_eq!(queue.stage(), "temp-1");
        assert_eq!(queue.stage(), "temp-2");
        assert_eq!(queue.stage(), "temp-3");
        assert_eq!(queue.pending_count(), 3);
    }

    #[test]
    fn temp_ids_are_recognizable() {
        assert!(OptimisticQueue::is_temp_id("temp-12"));
        assert!(!OptimisticQueue::is_temp_id("c1"));
    }

    // ── Confirm ─────────────────────────────────────────────────────

    #[test]
    fn confirm_substitutes_in_place() {
        let mut queue = OptimisticQueue::new();
        let temp_id = queue.stage();

        let mut list = vec![comment("c0", "earlier"), comment(&temp_id, "nice")];
        queue.confirm(&mut list, &temp_id, comment("c1", "nice")).expect("confirm");

        // Exactly once, same relative position, no temp id left.
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].id, "c1");
        assert!(!list.iter().any(|c| c.id == temp_id));

        let record = queue.record(&temp_id).expect("record");
        assert_eq!(record.status, MutationStatus::Confirmed);
        assert_eq!(record.real_id.as_deref(), Some("c1"));
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn confirm_requires_a_pending_record() {
        let mut queue = OptimisticQueue::new();
        let mut list = vec![comment("temp-9", "stray")];
        let err = queue.confirm(&mut list, "temp-9", comment("c1", "stray")).expect_err("err");
        assert_eq!(err, ReconcileError::UnknownTempId("temp-9".into()));
    }

    #[test]
    fn confirm_requires_the_entity_in_the_list() {
        let mut queue = OptimisticQueue::new();
        let temp_id = queue.stage();
        let mut list: Vec<Comment> = Vec::new();
        let err = queue.confirm(&mut list, &temp_id, comment("c1", "x")).expect_err("err");
        assert_eq!(err, ReconcileError::MissingEntity(temp_id));
    }

    #[test]
    fn double_confirm_is_rejected() {
        let mut queue = OptimisticQueue::new();
        let temp_id = queue.stage();
        let mut list = vec![comment(&temp_id, "nice")];
        queue.confirm(&mut list, &temp_id, comment("c1", "nice")).expect("first confirm");

        let err = queue.confirm(&mut list, &temp_id, comment("c2", "nice")).expect_err("second");
        assert_eq!(err, ReconcileError::UnknownTempId(temp_id));
        assert_eq!(list[0].id, "c1");
    }

    // ── Fail ────────────────────────────────────────────────────────

    #[test]
    fn fail_rolls_the_entity_back() {
        let mut queue = OptimisticQueue::new();
        let temp_id = queue.stage();
        let mut list = vec![comment("c0", "earlier"), comment(&temp_id, "doomed")];

        queue.fail(&mut list, &temp_id).expect("fail");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "c0");
        assert_eq!(queue.record(&temp_id).expect("record").status, MutationStatus::Failed);
    }

    #[test]
    fn identical_text_in_flight_reconciles_by_submission_order() {
        // Two pending comments with the same text: each confirmation lands
        // on its own entity, keyed by temp id, not content.
        let mut queue = OptimisticQueue::new();
        let first = queue.stage();
        let second = queue.stage();
        let mut list = vec![comment(&first, "same"), comment(&second, "same")];

        queue.confirm(&mut list, &second, comment("c2", "same")).expect("confirm second");
        queue.confirm(&mut list, &first, comment("c1", "same")).expect("confirm first");

        assert_eq!(list[0].id, "c1");
        assert_eq!(list[1].id, "c2");
    }
}
