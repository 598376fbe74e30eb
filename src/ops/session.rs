use serde::Serialize;
use tracing::{debug, warn};

use crate::model::board::{ListenerId, ModelChange, OrderModel};
use crate::model::container::BoardData;
use crate::model::event::ChangeEvent;
use crate::model::item::ItemRecord;
use crate::model::snapshot::OrderSnapshot;
use crate::ops::collision::{self, CollisionInput, DropTarget, RegionRegistry};
use crate::ops::drag::{DragEnd, DragError, GestureController, OverOutcome};
use crate::ops::optimistic::{
    MoveCoordinator, MoveError, MoveFailure, MoveRequest, MoveTarget, SettleOutcome, SubmitOutcome,
};
use crate::ops::remote::{RemoteConsumer, RemoteOutcome, ResyncOutcome};

/// Something the host must do on the session's behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send this move to the backend and report back via
    /// [`BoardSession::on_move_settled`]
    Dispatch(MoveRequest),
    /// Fetch a fresh board image and hand it to [`BoardSession::on_resync`]
    RequestResync,
    /// Tell the user
    Notify(Notice),
}

/// User-facing conditions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    MoveRolledBack { item_id: String, failure: MoveFailure },
    /// A drag ended because its item or column was removed remotely
    DragAborted { item_id: String },
    Disconnected,
    Reconnected,
}

/// One board's reordering engine: the model plus the components that
/// mutate it, driven from a single execution context.
///
/// Every entry point takes `&mut self`, so at most one of {speculative
/// drag update, optimistic commit, settlement, remote event} touches the
/// model per call. Network work is returned as [`Effect`]s.
#[derive(Debug)]
pub struct BoardSession {
    model: OrderModel,
    regions: RegionRegistry,
    gesture: GestureController,
    moves: MoveCoordinator,
    remote: RemoteConsumer,
}

impl BoardSession {
    pub fn new(board_id: impl Into<String>, data: BoardData) -> Self {
        BoardSession {
            model: OrderModel::from_board(data),
            regions: RegionRegistry::new(),
            gesture: GestureController::new(),
            moves: MoveCoordinator::new(),
            remote: RemoteConsumer::new(board_id),
        }
    }

    pub fn board_id(&self) -> &str {
        self.remote.board_id()
    }

    pub fn model(&self) -> &OrderModel {
        &self.model
    }

    pub fn regions(&self) -> &RegionRegistry {
        &self.regions
    }

    /// Droppable regions are registered by the renderer
    pub fn regions_mut(&mut self) -> &mut RegionRegistry {
        &mut self.regions
    }

    pub fn gesture(&self) -> &GestureController {
        &self.gesture
    }

    pub fn moves(&self) -> &MoveCoordinator {
        &self.moves
    }

    /// Order to render right now
    pub fn display(&self) -> &OrderSnapshot {
        self.gesture.display(&self.model)
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ModelChange) + 'static,
    {
        self.model.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.model.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------------

    pub fn begin_drag(&mut self, item_id: &str) -> Result<u64, DragError> {
        self.gesture.start(&self.model, item_id)
    }

    pub fn drag_over(&mut self, sequence: u64, input: &CollisionInput) -> OverOutcome {
        self.gesture.over_geometry(sequence, &self.regions, input)
    }

    pub fn drag_over_target(&mut self, sequence: u64, target: Option<DropTarget>) -> OverOutcome {
        self.gesture.over(sequence, target)
    }

    /// Release with geometry; falls back to the last resolved target
    pub fn end_drag(&mut self, sequence: u64, input: &CollisionInput) -> Vec<Effect> {
        let previous = match self.gesture.session() {
            Some(s) if s.sequence == sequence => s.last_target.clone(),
            _ => return Vec::new(),
        };
        let target = collision::resolve(&self.regions, input, previous.as_ref());
        self.end_drag_at(sequence, target)
    }

    pub fn end_drag_at(&mut self, sequence: u64, target: Option<DropTarget>) -> Vec<Effect> {
        match self.gesture.end(sequence, target) {
            DragEnd::Commit(intent) => {
                let target = MoveTarget::new(intent.container_id, intent.position);
                match self.submit(&intent.item_id, target) {
                    Ok(effects) => effects,
                    Err(e) => {
                        warn!(item = %intent.item_id, error = %e, "drag commit rejected");
                        Vec::new()
                    }
                }
            }
            DragEnd::Cancelled { .. } | DragEnd::Unchanged | DragEnd::Stale => Vec::new(),
        }
    }

    /// Abort a drag. The model was never touched, so nothing to undo.
    pub fn cancel_drag(&mut self, sequence: u64) -> bool {
        matches!(self.gesture.cancel(sequence), DragEnd::Cancelled { .. })
    }

    /// Move without a gesture (keyboard shortcut, scripted move)
    pub fn move_item(&mut self, item_id: &str, target: MoveTarget) -> Result<Vec<Effect>, MoveError> {
        self.submit(item_id, target)
    }

    fn submit(&mut self, item_id: &str, target: MoveTarget) -> Result<Vec<Effect>, MoveError> {
        let effects = match self.moves.submit_move(&mut self.model, item_id, target)? {
            SubmitOutcome::Dispatched(request) => vec![Effect::Dispatch(request)],
            SubmitOutcome::Queued | SubmitOutcome::Unchanged => Vec::new(),
        };
        Ok(self.after_model_change(effects))
    }

    // -----------------------------------------------------------------------
    // Backend and push channel
    // -----------------------------------------------------------------------

    pub fn on_move_settled(&mut self, request_id: u64, result: Result<ItemRecord, MoveFailure>) -> Vec<Effect> {
        let settlement = self.moves.settle(&mut self.model, request_id, result);
        let mut effects = Vec::new();
        if let SettleOutcome::RolledBack { item_id, failure } = settlement.outcome {
            effects.push(Effect::Notify(Notice::MoveRolledBack { item_id, failure }));
        }
        if let Some(next) = settlement.next {
            effects.push(Effect::Dispatch(next));
        }
        if settlement.resync {
            self.remote.defer_resync();
        }
        if self.remote.after_settle(self.moves.has_pending()) {
            effects.push(Effect::RequestResync);
        }
        self.after_model_change(effects)
    }

    pub fn on_change_event(&mut self, event: ChangeEvent) -> Vec<Effect> {
        let pending = self.moves.has_pending();
        match self.remote.apply(&mut self.model, pending, event) {
            RemoteOutcome::Applied => self.after_model_change(Vec::new()),
            RemoteOutcome::ResyncRequested => vec![Effect::RequestResync],
            RemoteOutcome::Ignored
            | RemoteOutcome::Deferred
            | RemoteOutcome::ForeignBoard
            | RemoteOutcome::Unknown(_) => Vec::new(),
        }
    }

    /// The push channel (re)connected. Events published before the stream
    /// opened were missed, so every connection requests a resync; only a
    /// reconnect is surfaced to the user.
    pub fn on_connected(&mut self, reconnect: bool) -> Vec<Effect> {
        let mut effects = Vec::new();
        if reconnect {
            effects.push(Effect::Notify(Notice::Reconnected));
        }
        if self.remote.on_reconnect(self.moves.has_pending()) == RemoteOutcome::ResyncRequested {
            effects.push(Effect::RequestResync);
        }
        effects
    }

    pub fn on_disconnected(&mut self) -> Vec<Effect> {
        vec![Effect::Notify(Notice::Disconnected)]
    }

    /// A fetched board image. Dropped while a local move is pending; a
    /// fresh resync is requested once it settles.
    pub fn on_resync(&mut self, data: BoardData) -> Vec<Effect> {
        match self.remote.accept_resync(&mut self.model, self.moves.has_pending(), data) {
            ResyncOutcome::Loaded => self.after_model_change(Vec::new()),
            ResyncOutcome::Discarded => Vec::new(),
        }
    }

    /// Keep an active drag consistent with a model that changed under it
    fn after_model_change(&mut self, mut effects: Vec<Effect>) -> Vec<Effect> {
        let dragged = self.gesture.session().map(|s| s.item_id.clone());
        if let Some(DragEnd::Cancelled { .. }) = self.gesture.rebase(&self.model)
            && let Some(item_id) = dragged
        {
            debug!(item = %item_id, "drag aborted by model change");
            effects.push(Effect::Notify(Notice::DragAborted { item_id }));
        }
        effects
    }
}
