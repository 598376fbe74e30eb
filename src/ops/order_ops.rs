use std::collections::HashMap;

use serde::Serialize;

use crate::model::board::OrderModel;
use crate::model::snapshot::OrderSnapshot;

/// One item whose index changed within one container between two snapshots.
/// `old_index` is `None` when the item entered the container, `new_index`
/// is `None` when it left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerChange {
    pub container_id: String,
    pub item_id: String,
    pub old_index: Option<usize>,
    pub new_index: Option<usize>,
}

/// Compute the minimal per-container update set between two snapshots.
///
/// Containers are visited in `after` order, then any container only present
/// in `before`. Items are listed by old index, then by new index for arrivals.
pub fn diff_containers(before: &OrderSnapshot, after: &OrderSnapshot) -> Vec<ContainerChange> {
    let mut changes = Vec::new();

    let mut container_ids: Vec<&str> = after.container_ids().collect();
    for id in before.container_ids() {
        if !after.has_container(id) {
            container_ids.push(id);
        }
    }

    for container_id in container_ids {
        let old = before.items_in(container_id);
        let new = after.items_in(container_id);
        let new_index: HashMap<&str, usize> = new
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        for (old_idx, item_id) in old.iter().enumerate() {
            let new_idx = new_index.get(item_id.as_str()).copied();
            if new_idx != Some(old_idx) {
                changes.push(ContainerChange {
                    container_id: container_id.to_string(),
                    item_id: item_id.clone(),
                    old_index: Some(old_idx),
                    new_index: new_idx,
                });
            }
        }
        for (new_idx, item_id) in new.iter().enumerate() {
            if !old.contains(item_id) {
                changes.push(ContainerChange {
                    container_id: container_id.to_string(),
                    item_id: item_id.clone(),
                    old_index: None,
                    new_index: Some(new_idx),
                });
            }
        }
    }
    changes
}

/// A broken ordering invariant found by [`check_invariants`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// `position` field disagrees with the item's index
    PositionMismatch {
        item_id: String,
        container_id: String,
        expected: usize,
        actual: usize,
    },
    /// `container_id` field disagrees with where the item is listed
    ContainerMismatch {
        item_id: String,
        listed_in: String,
        recorded: String,
    },
    /// Snapshot lists an id with no item record
    MissingRecord { item_id: String },
    /// Snapshot lists the same id more than once
    Duplicate { item_id: String },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvariantViolation::PositionMismatch {
                item_id,
                container_id,
                expected,
                actual,
            } => write!(
                f,
                "{item_id} in {container_id}: position {actual}, expected {expected}"
            ),
            InvariantViolation::ContainerMismatch {
                item_id,
                listed_in,
                recorded,
            } => write!(f, "{item_id}: listed in {listed_in} but records {recorded}"),
            InvariantViolation::MissingRecord { item_id } => {
                write!(f, "{item_id}: listed but has no record")
            }
            InvariantViolation::Duplicate { item_id } => write!(f, "{item_id}: listed twice"),
        }
    }
}

/// Verify every container holds a dense `0..n-1` run of positions that
/// matches the snapshot.
pub fn check_invariants(model: &OrderModel) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (container_id, ids) in model.snapshot().columns() {
        for (idx, id) in ids.iter().enumerate() {
            let count = seen.entry(id.as_str()).or_insert(0);
            *count += 1;
            if *count == 2 {
                violations.push(InvariantViolation::Duplicate {
                    item_id: id.clone(),
                });
            }
            match model.item(id) {
                None => violations.push(InvariantViolation::MissingRecord {
                    item_id: id.clone(),
                }),
                Some(item) => {
                    if item.container_id != *container_id {
                        violations.push(InvariantViolation::ContainerMismatch {
                            item_id: id.clone(),
                            listed_in: container_id.clone(),
                            recorded: item.container_id.clone(),
                        });
                    }
                    if item.position != idx {
                        violations.push(InvariantViolation::PositionMismatch {
                            item_id: id.clone(),
                            container_id: container_id.clone(),
                            expected: idx,
                            actual: item.position,
                        });
                    }
                }
            }
        }
    }
    violations
}

/// Check a raw board image before loading it: every column's positions
/// must already be dense and unique. Loading always repairs them; this
/// reports what the backend sent.
pub fn check_board_positions(data: &crate::model::container::BoardData) -> Vec<InvariantViolation> {
    let mut by_column: HashMap<&str, Vec<(&str, i64)>> = HashMap::new();
    for task in &data.tasks {
        by_column
            .entry(task.column_id.as_str())
            .or_default()
            .push((task.id.as_str(), task.position));
    }
    let mut violations = Vec::new();
    for column in &data.columns {
        let mut tasks = by_column.remove(column.id.as_str()).unwrap_or_default();
        tasks.sort_by_key(|(id, pos)| (*pos, *id));
        for (idx, (id, pos)) in tasks.iter().enumerate() {
            if *pos != idx as i64 {
                violations.push(InvariantViolation::PositionMismatch {
                    item_id: id.to_string(),
                    container_id: column.id.clone(),
                    expected: idx,
                    actual: (*pos).max(0) as usize,
                });
            }
        }
    }
    let mut orphans: Vec<&str> = by_column.values().flatten().map(|(id, _)| *id).collect();
    orphans.sort_unstable();
    for id in orphans {
        violations.push(InvariantViolation::MissingRecord {
            item_id: id.to_string(),
        });
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::board::ChangeReason;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diff_cross_container_move() {
        let before = OrderSnapshot::from_columns([("A", vec!["t1", "t2", "t3"]), ("B", vec![])]);
        let after = before.move_item("t2", "B", 0);
        let diff = diff_containers(&before, &after);
        assert_eq!(
            diff,
            vec![
                ContainerChange {
                    container_id: "A".into(),
                    item_id: "t2".into(),
                    old_index: Some(1),
                    new_index: None,
                },
                ContainerChange {
                    container_id: "A".into(),
                    item_id: "t3".into(),
                    old_index: Some(2),
                    new_index: Some(1),
                },
                ContainerChange {
                    container_id: "B".into(),
                    item_id: "t2".into(),
                    old_index: None,
                    new_index: Some(0),
                },
            ]
        );
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let snap = OrderSnapshot::from_columns([("A", vec!["t1", "t2"])]);
        assert!(diff_containers(&snap, &snap).is_empty());
    }

    #[test]
    fn test_invariants_hold_after_many_moves() {
        let mut model = crate::test_support::board(&[
            ("A", &["a1", "a2", "a3", "a4"]),
            ("B", &["b1", "b2"]),
            ("C", &[]),
        ]);
        let moves = [
            ("a1", "C", 0),
            ("b2", "A", 0),
            ("a3", "A", 9),
            ("a2", "B", 1),
            ("b1", "C", 1),
            ("a4", "C", 0),
            ("a1", "A", 2),
        ];
        for (item, container, pos) in moves {
            model.move_item(item, container, pos, ChangeReason::Optimistic);
            assert!(check_invariants(&model).is_empty());
        }
        assert_eq!(model.item_count(), 6);
    }

    #[test]
    fn test_board_positions_reports_gaps_and_orphans() {
        let data: crate::model::container::BoardData = serde_json::from_str(
            r#"{
                "columns": [{"id": "A", "title": "A", "order_index": 0}],
                "tasks": [
                    {"id": "t1", "column_id": "A", "title": "1", "position": 0},
                    {"id": "t2", "column_id": "A", "title": "2", "position": 2},
                    {"id": "t3", "column_id": "Z", "title": "3", "position": 0}
                ]
            }"#,
        )
        .unwrap();
        let violations = check_board_positions(&data);
        assert_eq!(violations.len(), 2);
        assert!(matches!(
            &violations[0],
            InvariantViolation::PositionMismatch { item_id, expected: 1, actual: 2, .. } if item_id == "t2"
        ));
        assert!(matches!(&violations[1], InvariantViolation::MissingRecord { item_id } if item_id == "t3"));
    }
}
