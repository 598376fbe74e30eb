use tracing::{debug, trace};

use crate::model::board::OrderModel;
use crate::model::snapshot::OrderSnapshot;
use crate::ops::collision::{self, CollisionInput, DropTarget, RegionRegistry};

/// Error type for gesture operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DragError {
    #[error("item not found: {0}")]
    UnknownItem(String),
    #[error("a drag is already in progress for {0}")]
    AlreadyDragging(String),
}

/// Final placement handed to the optimistic coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    pub item_id: String,
    pub container_id: String,
    pub position: usize,
}

/// Live state of one gesture
#[derive(Debug, Clone)]
pub struct DragSession {
    pub sequence: u64,
    pub item_id: String,
    pub origin_container: String,
    pub origin_index: usize,
    /// Where the item sits in the working copy
    pub current_container: String,
    pub current_index: usize,
    pub last_target: Option<DropTarget>,
    /// Restore point for cancellation
    pub pre_drag: OrderSnapshot,
    /// Speculative order rendered while dragging
    pub working: OrderSnapshot,
}

#[derive(Debug, Clone, Default)]
enum GestureState {
    #[default]
    Idle,
    Dragging(Box<DragSession>),
}

/// Result of an "over" update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverOutcome {
    /// Callback from an ended gesture, dropped
    Stale,
    /// Target resolved to the current placement
    Unchanged,
    /// Working copy changed; re-render from it
    Moved { container_id: String, index: usize },
}

/// How a gesture finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEnd {
    /// Callback from an ended gesture, dropped
    Stale,
    /// Dropped back where it started; nothing to send
    Unchanged,
    /// Ownership passes to the coordinator
    Commit(MoveIntent),
    /// Escape, or released over nothing; display the pre-drag order
    Cancelled { restore: OrderSnapshot },
}

/// Drives one drag gesture at a time: `Idle → Dragging → (commit | cancel) → Idle`
#[derive(Debug, Default)]
pub struct GestureController {
    state: GestureState,
    last_sequence: u64,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging(_))
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            GestureState::Dragging(s) => Some(&**s),
            GestureState::Idle => None,
        }
    }

    /// Order to render: the working copy while dragging, else the model's
    pub fn display<'a>(&'a self, model: &'a OrderModel) -> &'a OrderSnapshot {
        match &self.state {
            GestureState::Dragging(s) => &s.working,
            GestureState::Idle => model.snapshot(),
        }
    }

    /// Pick up an item. Returns the session sequence number that every
    /// later callback for this gesture must carry.
    pub fn start(&mut self, model: &OrderModel, item_id: &str) -> Result<u64, DragError> {
        if let Some(session) = self.session() {
            return Err(DragError::AlreadyDragging(session.item_id.clone()));
        }
        let (container, index) = model
            .locate(item_id)
            .ok_or_else(|| DragError::UnknownItem(item_id.to_string()))?;

        self.last_sequence += 1;
        let snapshot = model.snapshot().clone();
        let session = DragSession {
            sequence: self.last_sequence,
            item_id: item_id.to_string(),
            origin_container: container.to_string(),
            origin_index: index,
            current_container: container.to_string(),
            current_index: index,
            last_target: None,
            pre_drag: snapshot.clone(),
            working: snapshot,
        };
        debug!(item = item_id, container, index, seq = session.sequence, "drag start");
        self.state = GestureState::Dragging(Box::new(session));
        Ok(self.last_sequence)
    }

    fn live_session(&mut self, sequence: u64) -> Option<&mut DragSession> {
        match &mut self.state {
            GestureState::Dragging(s) if s.sequence == sequence => Some(&mut **s),
            _ => {
                trace!(seq = sequence, "stale drag callback ignored");
                None
            }
        }
    }

    /// Resolve geometry against the registry and apply the result
    pub fn over_geometry(
        &mut self,
        sequence: u64,
        registry: &RegionRegistry,
        input: &CollisionInput,
    ) -> OverOutcome {
        let previous = match self.session() {
            Some(s) if s.sequence == sequence => s.last_target.clone(),
            _ => return OverOutcome::Stale,
        };
        let target = collision::resolve(registry, input, previous.as_ref());
        self.over(sequence, target)
    }

    /// Apply a resolved target to the working copy
    pub fn over(&mut self, sequence: u64, target: Option<DropTarget>) -> OverOutcome {
        let Some(session) = self.live_session(sequence) else {
            return OverOutcome::Stale;
        };
        let Some(target) = target else {
            return OverOutcome::Unchanged;
        };
        // Already applied; re-applying an item target would shift past it
        if session.last_target.as_ref() == Some(&target) {
            return OverOutcome::Unchanged;
        }
        let placement = insertion_point(session, &target);
        session.last_target = Some(target);
        let Some((container, index)) = placement else {
            return OverOutcome::Unchanged;
        };
        if container == session.current_container && index == session.current_index {
            return OverOutcome::Unchanged;
        }

        session.working = session.working.move_item(&session.item_id, &container, index);
        match session.working.locate(&session.item_id) {
            Some((c, i)) if c == container && i == index => {
                session.current_container = container.clone();
                session.current_index = index;
                trace!(item = %session.item_id, container = %container, index, "speculative move");
                OverOutcome::Moved {
                    container_id: container,
                    index,
                }
            }
            _ => OverOutcome::Unchanged,
        }
    }

    /// Release the item. `target` is the final resolution; `None` means the
    /// pointer was released over nothing droppable.
    pub fn end(&mut self, sequence: u64, target: Option<DropTarget>) -> DragEnd {
        if self.live_session(sequence).is_none() {
            return DragEnd::Stale;
        }
        let Some(target) = target else {
            return self.finish_cancelled("released outside any target");
        };
        self.over(sequence, Some(target));

        let GestureState::Dragging(session) = std::mem::take(&mut self.state) else {
            return DragEnd::Stale;
        };
        let session = *session;
        if session.current_container == session.origin_container
            && session.current_index == session.origin_index
        {
            debug!(item = %session.item_id, "dropped in place");
            return DragEnd::Unchanged;
        }
        debug!(
            item = %session.item_id,
            container = %session.current_container,
            position = session.current_index,
            "drag commit"
        );
        DragEnd::Commit(MoveIntent {
            item_id: session.item_id,
            container_id: session.current_container,
            position: session.current_index,
        })
    }

    /// Abort the gesture, discarding the working copy
    pub fn cancel(&mut self, sequence: u64) -> DragEnd {
        if self.live_session(sequence).is_none() {
            return DragEnd::Stale;
        }
        self.finish_cancelled("cancelled")
    }

    fn finish_cancelled(&mut self, why: &str) -> DragEnd {
        match std::mem::take(&mut self.state) {
            GestureState::Dragging(session) => {
                debug!(item = %session.item_id, why, "drag cancel");
                DragEnd::Cancelled {
                    restore: session.pre_drag,
                }
            }
            GestureState::Idle => DragEnd::Stale,
        }
    }

    /// The model changed under an active drag (remote event, settlement).
    /// Re-derive the working copy from the new model, keeping the dragged
    /// item at its speculative placement. Cancels the drag if the item or
    /// its container disappeared.
    pub fn rebase(&mut self, model: &OrderModel) -> Option<DragEnd> {
        let GestureState::Dragging(session) = &mut self.state else {
            return None;
        };
        if model.locate(&session.item_id).is_none()
            || !model.snapshot().has_container(&session.current_container)
        {
            return Some(self.finish_cancelled("dragged item or column vanished"));
        }
        let base = model.snapshot();
        session.working = base.move_item(&session.item_id, &session.current_container, session.current_index);
        if let Some((c, i)) = session.working.locate(&session.item_id) {
            session.current_container = c.to_string();
            session.current_index = i;
        }
        if let Some((c, i)) = base.locate(&session.item_id) {
            session.origin_container = c.to_string();
            session.origin_index = i;
        }
        session.pre_drag = base.clone();
        None
    }
}

/// Where the dragged item would go for `target`, measured in the working copy
fn insertion_point(session: &DragSession, target: &DropTarget) -> Option<(String, usize)> {
    match target {
        DropTarget::Item { id, .. } if *id == session.item_id => Some((
            session.current_container.clone(),
            session.current_index,
        )),
        DropTarget::Item { id, .. } => {
            let (container, index) = session.working.locate(id)?;
            Some((container.to_string(), index))
        }
        DropTarget::Container { id } => {
            if !session.working.has_container(id) {
                return None;
            }
            let len = session.working.len_of(id);
            let end = if *id == session.current_container {
                len.saturating_sub(1)
            } else {
                len
            };
            Some((id.clone(), end))
        }
    }
}
