use serde::Serialize;

use crate::model::board::{ChangeReason, ModelChange, OrderModel};
use crate::ops::order_ops::{ContainerChange, InvariantViolation};
use crate::ops::remote::RemoteOutcome;
use crate::ops::session::Notice;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct CheckJson {
    pub ok: bool,
    pub columns: usize,
    pub items: usize,
    pub violations: Vec<InvariantViolation>,
}

#[derive(Serialize)]
pub struct MoveJson {
    pub item: String,
    pub column: String,
    pub position: usize,
    pub moved: bool,
    pub changes: Vec<ContainerChange>,
}

#[derive(Serialize)]
pub struct ApplyLineJson {
    pub line: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub outcome: &'static str,
}

#[derive(Serialize)]
pub struct ApplyJson {
    pub board_id: String,
    pub applied: usize,
    pub ignored: usize,
    pub skipped: usize,
    pub resync_needed: bool,
    pub events: Vec<ApplyLineJson>,
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

pub fn outcome_label(outcome: &RemoteOutcome) -> &'static str {
    match outcome {
        RemoteOutcome::Applied => "applied",
        RemoteOutcome::Ignored => "ignored",
        RemoteOutcome::Deferred => "deferred",
        RemoteOutcome::ResyncRequested => "resync",
        RemoteOutcome::ForeignBoard => "foreign_board",
        RemoteOutcome::Unknown(_) => "unknown",
    }
}

fn reason_label(reason: ChangeReason) -> &'static str {
    match reason {
        ChangeReason::Optimistic => "local",
        ChangeReason::Confirmed => "confirmed",
        ChangeReason::RolledBack => "rolled back",
        ChangeReason::Remote => "remote",
        ChangeReason::Resync => "resync",
    }
}

fn slot(index: Option<usize>) -> String {
    index.map_or_else(|| "-".to_string(), |i| i.to_string())
}

/// One line per container entry: `B: t2 -> 0`, `A: t3 2 -> 1`, `A: t2 1 -> -`
pub fn format_change(change: &ContainerChange) -> String {
    match change.old_index {
        None => format!("{}: {} -> {}", change.container_id, change.item_id, slot(change.new_index)),
        Some(old) => format!(
            "{}: {} {} -> {}",
            change.container_id,
            change.item_id,
            old,
            slot(change.new_index)
        ),
    }
}

pub fn format_model_change(change: &ModelChange) -> Vec<String> {
    change
        .changes
        .iter()
        .map(format_change)
        .chain(change.updated.iter().map(|id| format!("{id} updated")))
        .map(|line| format!("[{}] {line}", reason_label(change.reason)))
        .collect()
}

pub fn format_notice(notice: &Notice) -> String {
    match notice {
        Notice::MoveRolledBack { item_id, failure } => format!("move of {item_id} rolled back: {failure}"),
        Notice::DragAborted { item_id } => format!("drag of {item_id} aborted: item or column removed"),
        Notice::Disconnected => "disconnected, reconnecting...".to_string(),
        Notice::Reconnected => "reconnected".to_string(),
    }
}

/// Columns in rank order, each item with its position
pub fn render_board(model: &OrderModel) -> String {
    let mut out = String::new();
    for container in model.containers() {
        let items = model.items_in(&container.id);
        out.push_str(&format!("{} [{}] ({})\n", container.title, container.id, items.len()));
        if items.is_empty() {
            out.push_str("  (empty)\n");
        }
        for item in items {
            out.push_str(&format!("  {:>2}  {}  {}\n", item.position, item.id, item.title));
        }
    }
    out
}
