use std::collections::HashMap;

use indexmap::IndexMap;

use super::container::{BoardData, Container};
use super::item::{Item, ItemRecord};
use super::snapshot::OrderSnapshot;
use crate::ops::order_ops::{ContainerChange, diff_containers};

/// Why the order changed, passed to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Local move applied before the backend answered
    Optimistic,
    /// Backend confirmed a move
    Confirmed,
    /// Failed move reverted
    RolledBack,
    /// Push event from another client
    Remote,
    /// Full reload from the backend
    Resync,
}

/// Notification delivered to subscribed listeners
#[derive(Debug, Clone)]
pub struct ModelChange {
    pub reason: ChangeReason,
    pub changes: Vec<ContainerChange>,
    /// Items whose title or description may have changed
    pub updated: Vec<String>,
}

pub type ListenerId = u64;

type Listener = Box<dyn FnMut(&ModelChange)>;

/// The live board: container metadata, item records, and the current order.
///
/// Every mutation reindexes the containers it touched, so each item's
/// `position` always equals its index in the current snapshot.
pub struct OrderModel {
    containers: IndexMap<String, Container>,
    items: HashMap<String, Item>,
    order: OrderSnapshot,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
}

impl Default for OrderModel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OrderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderModel")
            .field("containers", &self.containers)
            .field("order", &self.order)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl OrderModel {
    pub fn new() -> Self {
        OrderModel {
            containers: IndexMap::new(),
            items: HashMap::new(),
            order: OrderSnapshot::new(),
            listeners: Vec::new(),
            next_listener: 1,
        }
    }

    /// Build a model from an authoritative board image
    pub fn from_board(data: BoardData) -> Self {
        let mut model = OrderModel::new();
        model.replace_contents(data);
        model
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> &OrderSnapshot {
        &self.order
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.get(item_id)
    }

    pub fn container(&self, container_id: &str) -> Option<&Container> {
        self.containers.get(container_id)
    }

    /// Containers in rank order
    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    /// Items of a container in display order
    pub fn items_in(&self, container_id: &str) -> Vec<&Item> {
        self.order
            .items_in(container_id)
            .iter()
            .filter_map(|id| self.items.get(id))
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Current `(container, position)` of an item
    pub fn locate(&self, item_id: &str) -> Option<(&str, usize)> {
        self.order.locate(item_id)
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Register a listener called after every order change
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ModelChange) + 'static,
    {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, reason: ChangeReason, before: &OrderSnapshot, updated: Vec<String>) {
        if self.listeners.is_empty() {
            return;
        }
        let changes = diff_containers(before, &self.order);
        let change = ModelChange {
            reason,
            changes,
            updated,
        };
        for (_, listener) in &mut self.listeners {
            listener(&change);
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Move an item to `position` (clamped) in `container_id`. Unknown
    /// items and containers leave the model unchanged.
    pub fn move_item(
        &mut self,
        item_id: &str,
        container_id: &str,
        position: usize,
        reason: ChangeReason,
    ) -> OrderSnapshot {
        let before = self.order.clone();
        if self.relocate(item_id, container_id, position) {
            self.notify(reason, &before, Vec::new());
        }
        self.order.clone()
    }

    /// Move without notifying. Returns whether the order changed.
    fn relocate(&mut self, item_id: &str, container_id: &str, position: usize) -> bool {
        let source = match self.order.locate(item_id) {
            Some((c, _)) => c.to_string(),
            None => return false,
        };
        if !self.order.move_in_place(item_id, container_id, position) {
            return false;
        }
        self.reindex(&source);
        if source != container_id {
            self.reindex(container_id);
        }
        true
    }

    /// Add a new item at its record position (clamped). Returns false if
    /// the id already exists or the container is unknown.
    pub fn insert_item(&mut self, record: ItemRecord, reason: ChangeReason) -> bool {
        if self.items.contains_key(&record.id) || !self.containers.contains_key(&record.column_id) {
            return false;
        }
        let before = self.order.clone();
        let index = record.index();
        let item = record.into_item();
        let container_id = item.container_id.clone();
        if !self.order.insert_item(&item.id, &container_id, index) {
            return false;
        }
        self.items.insert(item.id.clone(), item);
        self.reindex(&container_id);
        self.notify(reason, &before, Vec::new());
        true
    }

    /// Delete an item. Returns false if it was not present.
    pub fn remove_item(&mut self, item_id: &str, reason: ChangeReason) -> bool {
        if self.items.remove(item_id).is_none() {
            return false;
        }
        let before = self.order.clone();
        if let Some(container) = self.order.remove_item(item_id) {
            self.reindex(&container);
        }
        self.notify(reason, &before, Vec::new());
        true
    }

    /// Update display fields. `None` leaves a field untouched; the outer
    /// option on `description` distinguishes "absent" from "cleared".
    pub fn update_item(
        &mut self,
        item_id: &str,
        title: Option<String>,
        description: Option<Option<String>>,
        updated_at: Option<chrono::DateTime<chrono::Utc>>,
        reason: ChangeReason,
    ) -> bool {
        let Some(item) = self.items.get_mut(item_id) else {
            return false;
        };
        if let Some(title) = title {
            item.title = title;
        }
        if let Some(description) = description {
            item.description = description;
        }
        if updated_at.is_some() {
            item.updated_at = updated_at;
        }
        let before = self.order.clone();
        self.notify(reason, &before, vec![item_id.to_string()]);
        true
    }

    /// Adopt a server-confirmed record: its fields replace the local ones
    /// and the item is placed where the server put it. Returns false, and
    /// changes nothing, when the item or its column is no longer present.
    pub fn apply_authoritative(&mut self, record: ItemRecord) -> bool {
        if !self.containers.contains_key(&record.column_id) {
            return false;
        }
        let index = record.index();
        let Some(item) = self.items.get_mut(&record.id) else {
            return false;
        };
        item.title = record.title;
        item.description = record.description;
        if record.created_at.is_some() {
            item.created_at = record.created_at;
        }
        if record.updated_at.is_some() {
            item.updated_at = record.updated_at;
        }
        let before = self.order.clone();
        self.relocate(&record.id, &record.column_id, index);
        self.notify(ChangeReason::Confirmed, &before, vec![record.id]);
        true
    }

    /// Replace the order with `snapshot`. Items deleted since the snapshot
    /// was taken are dropped from it; items created since keep their
    /// current container and are appended after the restored ones.
    pub fn restore(&mut self, snapshot: &OrderSnapshot, reason: ChangeReason) {
        let before = self.order.clone();
        let mut restored = OrderSnapshot::new();
        {
            let columns = restored.columns_mut();
            for container_id in self.containers.keys() {
                let mut ids: Vec<String> = snapshot
                    .items_in(container_id)
                    .iter()
                    .filter(|id| self.items.contains_key(*id))
                    .cloned()
                    .collect();
                for id in self.order.items_in(container_id) {
                    if !snapshot.contains_item(id) {
                        ids.push(id.clone());
                    }
                }
                columns.insert(container_id.clone(), ids);
            }
        }
        // An item may have moved into a container the snapshot does not
        // list it under; keep exactly one placement per item.
        for id in before.columns().values().flatten() {
            if !restored.contains_item(id)
                && let Some((container, _)) = before.locate(id)
                && let Some(items) = restored.columns_mut().get_mut(container)
            {
                items.push(id.clone());
            }
        }
        self.order = restored;
        let ids: Vec<String> = self.containers.keys().cloned().collect();
        for container_id in ids {
            self.reindex(&container_id);
        }
        self.notify(reason, &before, Vec::new());
    }

    /// Replace everything with an authoritative board image
    pub fn load(&mut self, data: BoardData) {
        let before = self.order.clone();
        self.replace_contents(data);
        self.notify(ChangeReason::Resync, &before, Vec::new());
    }

    fn replace_contents(&mut self, data: BoardData) {
        let mut columns: Vec<Container> = data.columns.into_iter().map(Container::from).collect();
        columns.sort_by_key(|c| c.rank);

        let mut tasks = data.tasks;
        tasks.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));

        self.containers = columns.into_iter().map(|c| (c.id.clone(), c)).collect();
        self.items.clear();
        let mut order = OrderSnapshot::from_columns(
            self.containers.keys().map(|k| (k.clone(), Vec::<String>::new())),
        );
        for record in tasks {
            if !self.containers.contains_key(&record.column_id) || self.items.contains_key(&record.id) {
                continue;
            }
            if let Some(items) = order.columns_mut().get_mut(&record.column_id) {
                items.push(record.id.clone());
            }
            let item = record.into_item();
            self.items.insert(item.id.clone(), item);
        }
        self.order = order;
        let ids: Vec<String> = self.containers.keys().cloned().collect();
        for container_id in ids {
            self.reindex(&container_id);
        }
    }

    /// Re-derive `container_id` and dense `position` for one container
    fn reindex(&mut self, container_id: &str) {
        for (idx, id) in self.order.items_in(container_id).iter().enumerate() {
            if let Some(item) = self.items.get_mut(id) {
                item.container_id = container_id.to_string();
                item.position = idx;
            }
        }
    }

    /// Export the current state as a board image
    pub fn to_board(&self) -> BoardData {
        BoardData {
            columns: self
                .containers
                .values()
                .map(|c| super::container::ContainerRecord {
                    id: c.id.clone(),
                    title: c.title.clone(),
                    order_index: c.rank,
                })
                .collect(),
            tasks: self
                .containers
                .keys()
                .flat_map(|c| self.items_in(c))
                .map(Item::to_record)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample_model() -> OrderModel {
        crate::test_support::board(&[("A", &["t1", "t2", "t3"]), ("B", &[])])
    }

    fn positions(model: &OrderModel, container: &str) -> Vec<(String, usize)> {
        model
            .items_in(container)
            .iter()
            .map(|i| (i.id.clone(), i.position))
            .collect()
    }

    #[test]
    fn test_move_reindexes_both_containers() {
        let mut model = sample_model();
        model.move_item("t2", "B", 0, ChangeReason::Optimistic);
        assert_eq!(
            positions(&model, "A"),
            vec![("t1".to_string(), 0), ("t3".to_string(), 1)]
        );
        assert_eq!(positions(&model, "B"), vec![("t2".to_string(), 0)]);
        assert_eq!(model.item("t2").unwrap().container_id, "B");
    }

    #[test]
    fn test_move_unknown_item_is_noop() {
        let mut model = sample_model();
        let before = model.snapshot().clone();
        let after = model.move_item("ghost", "B", 0, ChangeReason::Optimistic);
        assert_eq!(after, before);
    }

    #[test]
    fn test_insert_is_idempotent_and_clamped() {
        let mut model = sample_model();
        let record = ItemRecord {
            id: "t4".into(),
            column_id: "B".into(),
            title: "new".into(),
            description: None,
            position: 7,
            created_at: None,
            updated_at: None,
        };
        assert!(model.insert_item(record.clone(), ChangeReason::Remote));
        assert!(!model.insert_item(record, ChangeReason::Remote));
        assert_eq!(positions(&model, "B"), vec![("t4".to_string(), 0)]);
    }

    #[test]
    fn test_remove_closes_gap() {
        let mut model = sample_model();
        assert!(model.remove_item("t1", ChangeReason::Remote));
        assert!(!model.remove_item("t1", ChangeReason::Remote));
        assert_eq!(
            positions(&model, "A"),
            vec![("t2".to_string(), 0), ("t3".to_string(), 1)]
        );
    }

    #[test]
    fn test_restore_drops_deleted_and_keeps_created() {
        let mut model = sample_model();
        let checkpoint = model.snapshot().clone();
        model.move_item("t1", "B", 0, ChangeReason::Optimistic);
        model.remove_item("t3", ChangeReason::Remote);
        model.insert_item(
            ItemRecord {
                id: "t9".into(),
                column_id: "A".into(),
                title: "late".into(),
                description: None,
                position: 0,
                created_at: None,
                updated_at: None,
            },
            ChangeReason::Remote,
        );
        model.restore(&checkpoint, ChangeReason::RolledBack);
        assert_eq!(model.snapshot().items_in("A"), ["t1", "t2", "t9"]);
        assert!(model.snapshot().items_in("B").is_empty());
        assert_eq!(model.item("t9").unwrap().position, 2);
    }

    #[test]
    fn test_apply_authoritative_uses_server_position() {
        let mut model = sample_model();
        model.move_item("t1", "B", 0, ChangeReason::Optimistic);
        let record = ItemRecord {
            id: "t1".into(),
            column_id: "A".into(),
            title: "renamed".into(),
            description: Some("server".into()),
            position: 1,
            created_at: None,
            updated_at: None,
        };
        assert!(model.apply_authoritative(record));
        assert_eq!(model.snapshot().items_in("A"), ["t2", "t1", "t3"]);
        assert_eq!(model.item("t1").unwrap().title, "renamed");
    }

    #[test]
    fn test_apply_authoritative_never_resurrects() {
        let mut model = sample_model();
        model.remove_item("t2", ChangeReason::Remote);
        let record = ItemRecord {
            id: "t2".into(),
            column_id: "B".into(),
            title: "t2".into(),
            description: None,
            position: 0,
            created_at: None,
            updated_at: None,
        };
        assert!(!model.apply_authoritative(record));
        assert!(model.item("t2").is_none());
        assert!(model.snapshot().items_in("B").is_empty());
    }

    #[test]
    fn test_field_changes_reach_listeners() {
        let mut model = sample_model();
        let seen: Rc<RefCell<Vec<(ChangeReason, Vec<String>, usize)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        model.subscribe(move |change| {
            sink.borrow_mut()
                .push((change.reason, change.updated.clone(), change.changes.len()))
        });

        assert!(model.update_item("t1", Some("Renamed".into()), None, None, ChangeReason::Remote));
        assert!(!model.update_item("ghost", Some("x".into()), None, None, ChangeReason::Remote));
        // Confirmed in place: no order change, still a notification
        let mut record = model.item("t3").unwrap().to_record();
        record.title = "server title".into();
        assert!(model.apply_authoritative(record));

        assert_eq!(
            *seen.borrow(),
            vec![
                (ChangeReason::Remote, vec!["t1".to_string()], 0),
                (ChangeReason::Confirmed, vec!["t3".to_string()], 0),
            ]
        );
        assert_eq!(model.item("t3").unwrap().title, "server title");
    }

    #[test]
    fn test_listeners_receive_diffs() {
        let mut model = sample_model();
        let seen: Rc<RefCell<Vec<ChangeReason>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = model.subscribe(move |change| {
            assert!(!change.changes.is_empty());
            sink.borrow_mut().push(change.reason);
        });
        model.move_item("t3", "A", 0, ChangeReason::Optimistic);
        // no-op moves stay silent
        model.move_item("t3", "A", 0, ChangeReason::Optimistic);
        assert!(model.unsubscribe(id));
        model.move_item("t1", "B", 0, ChangeReason::Optimistic);
        assert_eq!(*seen.borrow(), vec![ChangeReason::Optimistic]);
    }

    #[test]
    fn test_load_sorts_by_rank_and_position() {
        let data: BoardData = serde_json::from_str(
            r#"{
                "columns": [
                    {"id": "done", "title": "Done", "order_index": 2},
                    {"id": "todo", "title": "Todo", "order_index": 0}
                ],
                "tasks": [
                    {"id": "b", "column_id": "todo", "title": "B", "position": 4},
                    {"id": "a", "column_id": "todo", "title": "A", "position": 1},
                    {"id": "x", "column_id": "gone", "title": "X", "position": 0}
                ]
            }"#,
        )
        .unwrap();
        let model = OrderModel::from_board(data);
        let ids: Vec<&str> = model.containers().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["todo", "done"]);
        assert_eq!(model.snapshot().items_in("todo"), ["a", "b"]);
        assert_eq!(model.item("b").unwrap().position, 1);
        assert!(model.item("x").is_none());
    }
}
