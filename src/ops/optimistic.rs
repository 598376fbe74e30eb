use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::board::{ChangeReason, OrderModel};
use crate::model::item::ItemRecord;
use crate::model::snapshot::OrderSnapshot;

/// Error type for move submission. The model is untouched when one is returned.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("item not found: {0}")]
    UnknownItem(String),
    #[error("column not found: {0}")]
    UnknownContainer(String),
}

/// Why the backend did not confirm a move
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveFailure {
    #[error("network error: {detail}")]
    Network { detail: String },
    #[error("move rejected ({code}): {message}")]
    Rejected { code: String, message: String },
}

/// Destination of a move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTarget {
    #[serde(rename = "column_id")]
    pub container_id: String,
    pub position: usize,
}

impl MoveTarget {
    pub fn new(container_id: impl Into<String>, position: usize) -> Self {
        MoveTarget {
            container_id: container_id.into(),
            position,
        }
    }
}

/// A move the host must send to the backend, then report back through
/// [`MoveCoordinator::settle`] with the same `request_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub request_id: u64,
    pub item_id: String,
    pub target: MoveTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementState {
    InFlight,
    Confirmed,
    RolledBack,
}

/// An optimistic move awaiting the backend
#[derive(Debug, Clone)]
pub struct PendingMove {
    pub request_id: u64,
    pub item_id: String,
    pub target: MoveTarget,
    /// Order before this move was applied
    pub rollback: OrderSnapshot,
    pub state: SettlementState,
}

/// Result of [`MoveCoordinator::submit_move`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Already there; nothing applied, nothing sent
    Unchanged,
    /// Applied locally; send this request
    Dispatched(MoveRequest),
    /// The item has a move in flight; this one runs after it settles
    Queued,
}

/// How a settlement resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    Confirmed { item_id: String },
    RolledBack { item_id: String, failure: MoveFailure },
    /// Unknown or already settled request id
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: SettleOutcome,
    /// A queued move for the same item that was just applied and must be sent
    pub next: Option<MoveRequest>,
    /// The server's answer could not be adopted; the board needs a resync
    pub resync: bool,
}

/// Wraps the network move: apply locally first, then confirm or roll back.
///
/// At most one pending move exists per item. A second move for the same
/// item waits in a one-deep queue; a newer intent replaces an older queued
/// one.
#[derive(Debug, Default)]
pub struct MoveCoordinator {
    /// In submission order
    pending: Vec<PendingMove>,
    queued: HashMap<String, MoveTarget>,
    last_request: u64,
}

impl MoveCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_for(&self, item_id: &str) -> Option<&PendingMove> {
        self.pending.iter().find(|p| p.item_id == item_id)
    }

    pub fn queued_for(&self, item_id: &str) -> Option<&MoveTarget> {
        self.queued.get(item_id)
    }

    /// Apply a move to the model now and hand back the request to send.
    pub fn submit_move(
        &mut self,
        model: &mut OrderModel,
        item_id: &str,
        target: MoveTarget,
    ) -> Result<SubmitOutcome, MoveError> {
        let Some((current_container, current_index)) = model.locate(item_id) else {
            return Err(MoveError::UnknownItem(item_id.to_string()));
        };
        if !model.snapshot().has_container(&target.container_id) {
            return Err(MoveError::UnknownContainer(target.container_id));
        }

        if self.pending_for(item_id).is_some() {
            debug!(item = item_id, container = %target.container_id, "move queued behind pending move");
            self.queued.insert(item_id.to_string(), target);
            return Ok(SubmitOutcome::Queued);
        }

        let max = if current_container == target.container_id {
            model.snapshot().len_of(current_container) - 1
        } else {
            model.snapshot().len_of(&target.container_id)
        };
        let position = target.position.min(max);
        if current_container == target.container_id && current_index == position {
            return Ok(SubmitOutcome::Unchanged);
        }

        let rollback = model.snapshot().clone();
        model.move_item(item_id, &target.container_id, position, ChangeReason::Optimistic);

        self.last_request += 1;
        let target = MoveTarget::new(target.container_id, position);
        self.pending.push(PendingMove {
            request_id: self.last_request,
            item_id: item_id.to_string(),
            target: target.clone(),
            rollback,
            state: SettlementState::InFlight,
        });
        info!(
            request = self.last_request,
            item = item_id,
            container = %target.container_id,
            position,
            "optimistic move applied"
        );
        Ok(SubmitOutcome::Dispatched(MoveRequest {
            request_id: self.last_request,
            item_id: item_id.to_string(),
            target,
        }))
    }

    /// Record the backend's answer for `request_id`.
    ///
    /// Success adopts the server record, unless the item was deleted in
    /// the meantime or the record is for another item; those ask for a
    /// resync instead. Failure restores the move's rollback snapshot, then
    /// re-applies every other still-pending move in submission order so
    /// their optimistic state survives.
    pub fn settle(
        &mut self,
        model: &mut OrderModel,
        request_id: u64,
        result: Result<ItemRecord, MoveFailure>,
    ) -> Settlement {
        let Some(idx) = self.pending.iter().position(|p| p.request_id == request_id) else {
            debug!(request = request_id, "settlement for unknown request ignored");
            return Settlement {
                outcome: SettleOutcome::Stale,
                next: None,
                resync: false,
            };
        };
        let mut settled = self.pending.remove(idx);
        let item_id = settled.item_id.clone();
        let mut resync = false;

        let outcome = match result {
            Ok(record) => {
                settled.state = SettlementState::Confirmed;
                if record.id != item_id {
                    warn!(request = request_id, expected = %item_id, got = %record.id, "move response for a different item, not adopted");
                    resync = true;
                } else if model.apply_authoritative(record) {
                    self.rebase_rollbacks(model, &item_id);
                } else {
                    // Deleted remotely while in flight, or its column is gone
                    warn!(request = request_id, item = %item_id, "confirmed item no longer on the board, not adopted");
                    resync = true;
                }
                info!(request = request_id, item = %item_id, "move confirmed");
                SettleOutcome::Confirmed {
                    item_id: item_id.clone(),
                }
            }
            Err(failure) => {
                settled.state = SettlementState::RolledBack;
                model.restore(&settled.rollback, ChangeReason::RolledBack);
                // Moves submitted after this one were applied on top of it;
                // their rollback points now include a reverted state.
                for later in self.pending.iter_mut().filter(|p| p.request_id > request_id) {
                    later.rollback = model.snapshot().clone();
                    model.move_item(
                        &later.item_id,
                        &later.target.container_id,
                        later.target.position,
                        ChangeReason::RolledBack,
                    );
                }
                warn!(request = request_id, item = %item_id, error = %failure, "move rolled back");
                SettleOutcome::RolledBack {
                    item_id: item_id.clone(),
                    failure,
                }
            }
        };
        debug_assert!(settled.state != SettlementState::InFlight);

        let next = match self.queued.remove(&item_id) {
            Some(target) => match self.submit_move(model, &item_id, target) {
                Ok(SubmitOutcome::Dispatched(req)) => Some(req),
                Ok(_) => None,
                Err(e) => {
                    warn!(item = %item_id, error = %e, "queued move dropped");
                    None
                }
            },
            None => None,
        };

        Settlement { outcome, next, resync }
    }

    /// Put a confirmed item at its server placement in every remaining
    /// rollback point, so a later rollback cannot undo the confirmation.
    fn rebase_rollbacks(&mut self, model: &OrderModel, item_id: &str) {
        let Some((container, index)) = model.locate(item_id) else {
            return;
        };
        for pending in &mut self.pending {
            pending.rollback = pending.rollback.move_item(item_id, container, index);
        }
    }

    /// Forget queued intents and pending rollbacks without touching the
    /// model. Used when the board is reloaded from scratch.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.queued.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn model() -> OrderModel {
        crate::test_support::board(&[("A", &["t1", "t2", "t3"]), ("B", &[])])
    }

    fn record(id: &str, column: &str, position: i64) -> ItemRecord {
        ItemRecord {
            id: id.into(),
            column_id: column.into(),
            title: id.into(),
            description: None,
            position,
            created_at: None,
            updated_at: None,
        }
    }

    fn dispatched(outcome: Result<SubmitOutcome, MoveError>) -> MoveRequest {
        match outcome {
            Ok(SubmitOutcome::Dispatched(req)) => req,
            other => panic!("expected dispatch, got {other:?}"),
        }
    }

    fn network() -> MoveFailure {
        MoveFailure::Network {
            detail: "connection reset".into(),
        }
    }

    #[test]
    fn test_submit_applies_immediately() {
        let mut m = model();
        let mut c = MoveCoordinator::new();
        let req = dispatched(c.submit_move(&mut m, "t2", MoveTarget::new("B", 0)));
        assert_eq!(req.target, MoveTarget::new("B", 0));
        assert_eq!(m.snapshot().items_in("A"), ["t1", "t3"]);
        assert_eq!(m.snapshot().items_in("B"), ["t2"]);
        assert_eq!(m.item("t3").unwrap().position, 1);
        assert_eq!(c.pending_for("t2").unwrap().state, SettlementState::InFlight);
    }

    #[test]
    fn test_submit_to_current_place_is_unchanged() {
        let mut m = model();
        let mut c = MoveCoordinator::new();
        assert_eq!(
            c.submit_move(&mut m, "t3", MoveTarget::new("A", 2)),
            Ok(SubmitOutcome::Unchanged)
        );
        // Clamped to the same slot
        assert_eq!(
            c.submit_move(&mut m, "t3", MoveTarget::new("A", 40)),
            Ok(SubmitOutcome::Unchanged)
        );
        assert!(!c.has_pending());
    }

    #[test]
    fn test_submit_unknown_ids() {
        let mut m = model();
        let mut c = MoveCoordinator::new();
        let before = m.snapshot().clone();
        assert_eq!(
            c.submit_move(&mut m, "nope", MoveTarget::new("B", 0)),
            Err(MoveError::UnknownItem("nope".into()))
        );
        assert_eq!(
            c.submit_move(&mut m, "t1", MoveTarget::new("gone", 0)),
            Err(MoveError::UnknownContainer("gone".into()))
        );
        assert_eq!(m.snapshot(), &before);
    }

    #[test]
    fn test_failure_restores_exactly() {
        let mut m = model();
        let original: Vec<_> = m.items_in("A").into_iter().cloned().collect();
        let mut c = MoveCoordinator::new();
        let req = dispatched(c.submit_move(&mut m, "t2", MoveTarget::new("B", 0)));
        let s = c.settle(&mut m, req.request_id, Err(network()));
        assert!(matches!(s.outcome, SettleOutcome::RolledBack { .. }));
        let restored: Vec<_> = m.items_in("A").into_iter().cloned().collect();
        assert_eq!(restored, original);
        assert!(m.snapshot().items_in("B").is_empty());
        assert!(!c.has_pending());
    }

    #[test]
    fn test_success_adopts_server_position() {
        let mut m = model();
        let mut c = MoveCoordinator::new();
        let req = dispatched(c.submit_move(&mut m, "t1", MoveTarget::new("A", 2)));
        assert_eq!(m.snapshot().items_in("A"), ["t2", "t3", "t1"]);
        // Server tie-breaks differently
        let s = c.settle(&mut m, req.request_id, Ok(record("t1", "A", 1)));
        assert_eq!(
            s.outcome,
            SettleOutcome::Confirmed {
                item_id: "t1".into()
            }
        );
        assert_eq!(m.snapshot().items_in("A"), ["t2", "t1", "t3"]);
        assert_eq!(c.settle(&mut m, req.request_id, Err(network())).outcome, SettleOutcome::Stale);
    }

    #[test]
    fn test_second_move_for_same_item_queues() {
        let mut m = model();
        let mut c = MoveCoordinator::new();
        let first = dispatched(c.submit_move(&mut m, "t1", MoveTarget::new("B", 0)));
        assert_eq!(
            c.submit_move(&mut m, "t1", MoveTarget::new("A", 0)),
            Ok(SubmitOutcome::Queued)
        );
        // newer intent replaces the older queued one
        assert_eq!(
            c.submit_move(&mut m, "t1", MoveTarget::new("A", 1)),
            Ok(SubmitOutcome::Queued)
        );
        assert_eq!(c.pending_count(), 1);
        assert_eq!(m.snapshot().items_in("B"), ["t1"]);

        let s = c.settle(&mut m, first.request_id, Ok(record("t1", "B", 0)));
        let next = s.next.expect("queued move dispatched");
        assert_eq!(next.target, MoveTarget::new("A", 1));
        assert_eq!(m.snapshot().items_in("A"), ["t2", "t1", "t3"]);
        assert_eq!(c.pending_for("t1").unwrap().request_id, next.request_id);
    }

    #[test]
    fn test_confirm_after_remote_delete_is_not_adopted() {
        let mut m = model();
        let mut c = MoveCoordinator::new();
        let req = dispatched(c.submit_move(&mut m, "t2", MoveTarget::new("B", 0)));
        m.remove_item("t2", ChangeReason::Remote);

        let s = c.settle(&mut m, req.request_id, Ok(record("t2", "B", 0)));
        assert!(s.resync);
        assert!(m.item("t2").is_none());
        assert!(m.snapshot().items_in("B").is_empty());
        assert!(!c.has_pending());
    }

    #[test]
    fn test_record_for_another_item_is_not_adopted() {
        let mut m = model();
        let mut c = MoveCoordinator::new();
        let req = dispatched(c.submit_move(&mut m, "t1", MoveTarget::new("B", 0)));
        let s = c.settle(&mut m, req.request_id, Ok(record("t3", "B", 0)));
        assert!(s.resync);
        assert_eq!(m.snapshot().items_in("A"), ["t2", "t3"]);
        assert_eq!(m.snapshot().items_in("B"), ["t1"]);
    }

    #[test]
    fn test_later_rollback_keeps_earlier_confirmation() {
        let mut m = crate::test_support::board(&[("A", &["t1", "t2", "t3"]), ("B", &["b1"])]);
        let mut c = MoveCoordinator::new();
        let early = dispatched(c.submit_move(&mut m, "t1", MoveTarget::new("B", 0)));
        let late = dispatched(c.submit_move(&mut m, "t3", MoveTarget::new("A", 0)));

        // Server places t1 after b1 rather than before it
        let s = c.settle(&mut m, early.request_id, Ok(record("t1", "B", 1)));
        assert!(!s.resync);
        assert_eq!(m.snapshot().items_in("B"), ["b1", "t1"]);

        c.settle(&mut m, late.request_id, Err(network()));
        assert_eq!(m.snapshot().items_in("A"), ["t2", "t3"]);
        assert_eq!(m.snapshot().items_in("B"), ["b1", "t1"]);
        assert!(crate::ops::order_ops::check_invariants(&m).is_empty());
    }

    #[test]
    fn test_rollback_replays_other_pending_moves() {
        let mut m = model();
        let mut c = MoveCoordinator::new();
        let a = dispatched(c.submit_move(&mut m, "t1", MoveTarget::new("B", 0)));
        let _b = dispatched(c.submit_move(&mut m, "t3", MoveTarget::new("B", 1)));
        assert_eq!(m.snapshot().items_in("B"), ["t1", "t3"]);

        c.settle(&mut m, a.request_id, Err(network()));
        assert_eq!(m.snapshot().items_in("A"), ["t1", "t2"]);
        assert_eq!(m.snapshot().items_in("B"), ["t3"]);
        assert_eq!(c.pending_count(), 1);
        assert!(crate::ops::order_ops::check_invariants(&m).is_empty());
    }
}
