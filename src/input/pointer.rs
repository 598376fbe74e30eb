use tracing::trace;

use crate::ops::collision::{CollisionInput, Point, Rect};
use crate::ops::drag::{DragError, OverOutcome};
use crate::ops::session::{BoardSession, Effect};

#[derive(Debug, Clone, Default)]
enum PointerState {
    #[default]
    Idle,
    /// Button down on an item, not yet past the activation distance
    Pressed {
        item_id: String,
        origin: Point,
        item_rect: Rect,
    },
    Dragging {
        sequence: u64,
        origin: Point,
        item_rect: Rect,
    },
}

/// Turns raw pointer press/move/release into drag-session calls.
///
/// A press only becomes a drag once the pointer travels past the
/// activation distance, so plain clicks never start a gesture.
#[derive(Debug, Clone)]
pub struct PointerSensor {
    activation_distance: f64,
    state: PointerState,
}

impl PointerSensor {
    pub fn new(activation_distance: f64) -> Self {
        PointerSensor {
            activation_distance,
            state: PointerState::Idle,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, PointerState::Dragging { .. })
    }

    /// Button down on `item_id`, whose card occupies `item_rect`
    pub fn press(&mut self, item_id: &str, at: Point, item_rect: Rect) {
        if self.is_dragging() {
            return;
        }
        self.state = PointerState::Pressed {
            item_id: item_id.to_string(),
            origin: at,
            item_rect,
        };
    }

    /// Pointer moved. Returns the speculative outcome once dragging.
    pub fn motion(&mut self, session: &mut BoardSession, at: Point) -> Result<Option<OverOutcome>, DragError> {
        self.forget_ended(session);
        match &self.state {
            PointerState::Idle => Ok(None),
            PointerState::Pressed {
                item_id,
                origin,
                item_rect,
            } => {
                if origin.distance(at) <= self.activation_distance {
                    return Ok(None);
                }
                let (origin, item_rect) = (*origin, *item_rect);
                let sequence = match session.begin_drag(item_id) {
                    Ok(seq) => seq,
                    Err(e) => {
                        self.state = PointerState::Idle;
                        return Err(e);
                    }
                };
                trace!(seq = sequence, "pointer drag activated");
                self.state = PointerState::Dragging {
                    sequence,
                    origin,
                    item_rect,
                };
                Ok(Some(session.drag_over(sequence, &geometry(origin, item_rect, at))))
            }
            PointerState::Dragging {
                sequence,
                origin,
                item_rect,
            } => Ok(Some(session.drag_over(*sequence, &geometry(*origin, *item_rect, at)))),
        }
    }

    /// Button up. A press that never activated is a click: no effects.
    pub fn release(&mut self, session: &mut BoardSession, at: Point) -> Vec<Effect> {
        match std::mem::take(&mut self.state) {
            PointerState::Dragging {
                sequence,
                origin,
                item_rect,
            } => session.end_drag(sequence, &geometry(origin, item_rect, at)),
            PointerState::Idle | PointerState::Pressed { .. } => Vec::new(),
        }
    }

    /// Escape or pointer capture lost
    pub fn cancel(&mut self, session: &mut BoardSession) -> bool {
        match std::mem::take(&mut self.state) {
            PointerState::Dragging { sequence, .. } => session.cancel_drag(sequence),
            PointerState::Idle | PointerState::Pressed { .. } => false,
        }
    }

    /// The session may have aborted the gesture on its own
    fn forget_ended(&mut self, session: &BoardSession) {
        if let PointerState::Dragging { sequence, .. } = self.state
            && session.gesture().session().map(|s| s.sequence) != Some(sequence)
        {
            self.state = PointerState::Idle;
        }
    }
}

/// The card follows the pointer, keeping the grab offset
fn geometry(origin: Point, item_rect: Rect, at: Point) -> CollisionInput {
    let dx = at.x - origin.x;
    let dy = at.y - origin.y;
    CollisionInput {
        pointer: Some(at),
        drag_rect: Rect::new(item_rect.x + dx, item_rect.y + dy, item_rect.width, item_rect.height),
    }
}
