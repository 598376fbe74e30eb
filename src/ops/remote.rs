use tracing::{debug, info, warn};

use crate::model::board::{ChangeReason, OrderModel};
use crate::model::container::BoardData;
use crate::model::event::{ChangeEvent, ChangeKind};
use crate::model::item::ItemRecord;

/// What the consumer did with one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The model changed
    Applied,
    /// Nothing to do: duplicate create, absent id, unknown container
    Ignored,
    /// A move-type event arrived during a local move; resync later
    Deferred,
    /// The host must fetch a fresh board image
    ResyncRequested,
    /// Scoped to a board this consumer does not follow
    ForeignBoard,
    /// A `type` this client does not understand
    Unknown(String),
}

/// Result of handing a fetched board image to [`RemoteConsumer::accept_resync`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    Loaded,
    /// A local move is still pending; the image was dropped and a resync
    /// will be requested again once it settles
    Discarded,
}

/// Folds push events from other clients into the model.
///
/// Create, update and delete events are applied immediately and
/// idempotently. Move events are never applied positionally: they trigger a
/// full resync, postponed while any local move is pending so the echo of
/// our own move cannot clobber the optimistic state.
#[derive(Debug)]
pub struct RemoteConsumer {
    board_id: String,
    deferred_resync: bool,
}

impl RemoteConsumer {
    pub fn new(board_id: impl Into<String>) -> Self {
        RemoteConsumer {
            board_id: board_id.into(),
            deferred_resync: false,
        }
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// True when a resync is owed once pending moves settle
    pub fn has_deferred_resync(&self) -> bool {
        self.deferred_resync
    }

    pub fn apply(&mut self, model: &mut OrderModel, move_pending: bool, event: ChangeEvent) -> RemoteOutcome {
        if event.board_id != self.board_id {
            debug!(board = %event.board_id, "event for another board ignored");
            return RemoteOutcome::ForeignBoard;
        }
        let applied = match event.kind {
            ChangeKind::Created(p) => {
                let record = ItemRecord {
                    id: p.id,
                    column_id: p.column_id,
                    title: p.title,
                    description: p.description,
                    position: p.position,
                    created_at: event.timestamp,
                    updated_at: event.timestamp,
                };
                model.insert_item(record, ChangeReason::Remote)
            }
            ChangeKind::Updated(p) => {
                model.update_item(&p.id, p.title, p.description, event.timestamp, ChangeReason::Remote)
            }
            ChangeKind::Deleted(p) => model.remove_item(&p.id, ChangeReason::Remote),
            ChangeKind::Moved(p) => {
                if move_pending {
                    debug!(item = %p.id, "remote move deferred behind pending local move");
                    self.deferred_resync = true;
                    return RemoteOutcome::Deferred;
                }
                info!(item = %p.id, to = %p.to_column_id, "remote move, requesting resync");
                return RemoteOutcome::ResyncRequested;
            }
            ChangeKind::Unknown(name) => {
                debug!(kind = %name, "unknown event type ignored");
                return RemoteOutcome::Unknown(name);
            }
        };
        if applied {
            RemoteOutcome::Applied
        } else {
            RemoteOutcome::Ignored
        }
    }

    /// The push channel (re)connected; events may have been missed.
    pub fn on_reconnect(&mut self, move_pending: bool) -> RemoteOutcome {
        if move_pending {
            self.deferred_resync = true;
            return RemoteOutcome::Deferred;
        }
        info!(board = %self.board_id, "push channel connected, requesting resync");
        RemoteOutcome::ResyncRequested
    }

    /// Owe a resync, requested by [`RemoteConsumer::after_settle`] once no
    /// move is pending.
    pub fn defer_resync(&mut self) {
        self.deferred_resync = true;
    }

    /// Call after a local move settles. Returns true when the deferred
    /// resync should be requested now.
    pub fn after_settle(&mut self, move_pending: bool) -> bool {
        if self.deferred_resync && !move_pending {
            self.deferred_resync = false;
            info!(board = %self.board_id, "pending moves settled, requesting deferred resync");
            return true;
        }
        false
    }

    pub fn accept_resync(&mut self, model: &mut OrderModel, move_pending: bool, data: BoardData) -> ResyncOutcome {
        if move_pending {
            warn!(board = %self.board_id, "resync arrived during a pending move, discarded");
            self.deferred_resync = true;
            return ResyncOutcome::Discarded;
        }
        self.deferred_resync = false;
        model.load(data);
        info!(board = %self.board_id, items = model.item_count(), "board resynchronized");
        ResyncOutcome::Loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::decode_event;
    use pretty_assertions::assert_eq;

    fn model() -> OrderModel {
        crate::test_support::board(&[("A", &["t1", "t2", "t3"]), ("B", &[])])
    }

    fn event(json: &str) -> ChangeEvent {
        decode_event(json).unwrap()
    }

    #[test]
    fn test_created_inserts_at_position() {
        let mut model = model();
        let mut consumer = RemoteConsumer::new("b1");
        let ev = event(
            r#"{"type":"created","board_id":"b1","payload":{"id":"t9","column_id":"A","title":"New","position":1}}"#,
        );
        assert_eq!(consumer.apply(&mut model, false, ev.clone()), RemoteOutcome::Applied);
        assert_eq!(model.snapshot().items_in("A"), ["t1", "t9", "t2", "t3"]);
        assert_eq!(model.item("t3").unwrap().position, 3);

        assert_eq!(consumer.apply(&mut model, false, ev), RemoteOutcome::Ignored);
        assert_eq!(model.item_count(), 4);
    }

    #[test]
    fn test_created_into_unknown_container_ignored() {
        let mut model = model();
        let mut consumer = RemoteConsumer::new("b1");
        let ev = event(
            r#"{"type":"created","board_id":"b1","payload":{"id":"t9","column_id":"Z","title":"New","position":0}}"#,
        );
        assert_eq!(consumer.apply(&mut model, false, ev), RemoteOutcome::Ignored);
        assert!(!model.snapshot().contains_item("t9"));
    }

    #[test]
    fn test_deleted_twice_same_as_once() {
        let mut model = model();
        let mut consumer = RemoteConsumer::new("b1");
        let ev = event(r#"{"type":"deleted","board_id":"b1","payload":{"id":"t2"}}"#);
        assert_eq!(consumer.apply(&mut model, false, ev.clone()), RemoteOutcome::Applied);
        let once = model.snapshot().clone();
        assert_eq!(consumer.apply(&mut model, false, ev), RemoteOutcome::Ignored);
        assert_eq!(model.snapshot(), &once);
        assert_eq!(model.item("t3").unwrap().position, 1);
    }

    #[test]
    fn test_updated_changes_fields_only() {
        let mut model = model();
        let mut consumer = RemoteConsumer::new("b1");
        let ev = event(r#"{"type":"updated","board_id":"b1","payload":{"id":"t1","title":"Renamed","description":"d"}}"#);
        assert_eq!(consumer.apply(&mut model, false, ev), RemoteOutcome::Applied);
        let item = model.item("t1").unwrap();
        assert_eq!(item.title, "Renamed");
        assert_eq!(item.description.as_deref(), Some("d"));
        assert_eq!(item.position, 0);

        let missing = event(r#"{"type":"updated","board_id":"b1","payload":{"id":"nope","title":"x"}}"#);
        assert_eq!(consumer.apply(&mut model, false, missing), RemoteOutcome::Ignored);
    }

    #[test]
    fn test_moved_requests_resync_or_defers() {
        let mut model = model();
        let mut consumer = RemoteConsumer::new("b1");
        let ev = event(
            r#"{"type":"moved","board_id":"b1","payload":{"id":"t1","from_column_id":"A","to_column_id":"B","position":0}}"#,
        );
        assert_eq!(consumer.apply(&mut model, false, ev.clone()), RemoteOutcome::ResyncRequested);
        assert_eq!(model.snapshot().items_in("A"), ["t1", "t2", "t3"]);

        assert_eq!(consumer.apply(&mut model, true, ev), RemoteOutcome::Deferred);
        assert!(consumer.has_deferred_resync());
        assert!(!consumer.after_settle(true));
        assert!(consumer.after_settle(false));
        assert!(!consumer.after_settle(false));
    }

    #[test]
    fn test_foreign_board_and_unknown_ignored() {
        let mut model = model();
        let mut consumer = RemoteConsumer::new("b1");
        let foreign = event(r#"{"type":"deleted","board_id":"b2","payload":{"id":"t1"}}"#);
        assert_eq!(consumer.apply(&mut model, false, foreign), RemoteOutcome::ForeignBoard);
        let unknown = event(r#"{"type":"column_created","board_id":"b1","payload":{}}"#);
        assert_eq!(
            consumer.apply(&mut model, false, unknown),
            RemoteOutcome::Unknown("column_created".into())
        );
        assert_eq!(model.item_count(), 3);
    }

    #[test]
    fn test_resync_discarded_while_pending() {
        let mut model = model();
        let mut consumer = RemoteConsumer::new("b1");
        let data = crate::test_support::board(&[("A", &["t3"]), ("B", &["t1"])]).to_board();

        assert_eq!(consumer.accept_resync(&mut model, true, data.clone()), ResyncOutcome::Discarded);
        assert_eq!(model.snapshot().items_in("A"), ["t1", "t2", "t3"]);
        assert!(consumer.after_settle(false));

        assert_eq!(consumer.accept_resync(&mut model, false, data), ResyncOutcome::Loaded);
        assert_eq!(model.snapshot().items_in("A"), ["t3"]);
        assert_eq!(model.snapshot().items_in("B"), ["t1"]);
    }

    #[test]
    fn test_reconnect() {
        let mut consumer = RemoteConsumer::new("b1");
        assert_eq!(consumer.on_reconnect(false), RemoteOutcome::ResyncRequested);
        assert_eq!(consumer.on_reconnect(true), RemoteOutcome::Deferred);
        assert!(consumer.after_settle(false));
    }
}
