use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::trace;

use crate::ops::collision::{CollisionInput, Point, Rect};
use crate::ops::drag::DragError;
use crate::ops::session::{BoardSession, Effect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// What a key means to a keyboard drag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardCommand {
    PickUp,
    Drop,
    Cancel,
    Move(Direction),
}

/// Map a key to a drag command. Space and Enter pick up, then drop; Esc
/// cancels; arrows or hjkl move while an item is held.
pub fn command_for(key: KeyEvent, dragging: bool) -> Option<KeyboardCommand> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let cmd = match (key.modifiers, key.code) {
        (_, KeyCode::Char(' ')) | (_, KeyCode::Enter) => {
            if dragging {
                KeyboardCommand::Drop
            } else {
                KeyboardCommand::PickUp
            }
        }
        (_, KeyCode::Esc) if dragging => KeyboardCommand::Cancel,
        (KeyModifiers::NONE, KeyCode::Char('k')) | (_, KeyCode::Up) if dragging => {
            KeyboardCommand::Move(Direction::Up)
        }
        (KeyModifiers::NONE, KeyCode::Char('j')) | (_, KeyCode::Down) if dragging => {
            KeyboardCommand::Move(Direction::Down)
        }
        (KeyModifiers::NONE, KeyCode::Char('h')) | (_, KeyCode::Left) if dragging => {
            KeyboardCommand::Move(Direction::Left)
        }
        (KeyModifiers::NONE, KeyCode::Char('l')) | (_, KeyCode::Right) if dragging => {
            KeyboardCommand::Move(Direction::Right)
        }
        _ => return None,
    };
    Some(cmd)
}

/// Keyboard drags: the held card jumps between registered regions and
/// the resolver runs without a pointer.
#[derive(Debug, Clone, Default)]
pub struct KeyboardSensor {
    active: Option<(u64, Rect)>,
}

impl KeyboardSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    /// Current box of the held card
    pub fn drag_rect(&self) -> Option<Rect> {
        self.active.map(|(_, rect)| rect)
    }

    /// Handle a key for the card with keyboard focus
    pub fn handle_key(
        &mut self,
        session: &mut BoardSession,
        focused: &str,
        key: KeyEvent,
    ) -> Result<Vec<Effect>, DragError> {
        self.forget_ended(session);
        match command_for(key, self.is_dragging()) {
            Some(cmd) => self.apply(session, focused, cmd),
            None => Ok(Vec::new()),
        }
    }

    pub fn apply(
        &mut self,
        session: &mut BoardSession,
        focused: &str,
        cmd: KeyboardCommand,
    ) -> Result<Vec<Effect>, DragError> {
        match (cmd, self.active) {
            (KeyboardCommand::PickUp, None) => {
                let sequence = session.begin_drag(focused)?;
                let rect = session
                    .regions()
                    .get(focused)
                    .map(|r| r.rect)
                    .unwrap_or_default();
                self.active = Some((sequence, rect));
                Ok(Vec::new())
            }
            (KeyboardCommand::Move(direction), Some((sequence, rect))) => {
                let Some(center) = next_stop(session, focused_item(session), rect.center(), direction) else {
                    return Ok(Vec::new());
                };
                let rect = rect.centered_at(center);
                trace!(?direction, x = center.x, y = center.y, "keyboard drag step");
                self.active = Some((sequence, rect));
                session.drag_over(
                    sequence,
                    &CollisionInput {
                        pointer: None,
                        drag_rect: rect,
                    },
                );
                Ok(Vec::new())
            }
            (KeyboardCommand::Drop, Some((sequence, rect))) => {
                self.active = None;
                Ok(session.end_drag(
                    sequence,
                    &CollisionInput {
                        pointer: None,
                        drag_rect: rect,
                    },
                ))
            }
            (KeyboardCommand::Cancel, Some((sequence, _))) => {
                self.active = None;
                session.cancel_drag(sequence);
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn forget_ended(&mut self, session: &BoardSession) {
        if let Some((sequence, _)) = self.active
            && session.gesture().session().map(|s| s.sequence) != Some(sequence)
        {
            self.active = None;
        }
    }
}

fn focused_item(session: &BoardSession) -> Option<String> {
    session.gesture().session().map(|s| s.item_id.clone())
}

/// Center of the nearest region strictly in `direction` from `from`,
/// skipping the held card's own region
fn next_stop(session: &BoardSession, held: Option<String>, from: Point, direction: Direction) -> Option<Point> {
    session
        .regions()
        .iter()
        .filter(|r| held.as_deref() != Some(r.id.as_str()))
        .map(|r| r.rect.center())
        .filter(|c| match direction {
            Direction::Up => c.y < from.y,
            Direction::Down => c.y > from.y,
            Direction::Left => c.x < from.x,
            Direction::Right => c.x > from.x,
        })
        .min_by(|a, b| from.distance(*a).total_cmp(&from.distance(*b)))
}
