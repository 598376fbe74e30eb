use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Immutable view of board order: container id → item ids, top to bottom.
///
/// Containers iterate in rank order. Positions are implicit in the vector
/// index, so every snapshot is dense by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderSnapshot {
    columns: IndexMap<String, Vec<String>>,
}

impl OrderSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(container, items)` pairs in rank order
    pub fn from_columns<I, C, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (C, Vec<S>)>,
        C: Into<String>,
        S: Into<String>,
    {
        OrderSnapshot {
            columns: columns
                .into_iter()
                .map(|(c, items)| (c.into(), items.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    pub fn columns(&self) -> &IndexMap<String, Vec<String>> {
        &self.columns
    }

    pub fn container_ids(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_container(&self, container_id: &str) -> bool {
        self.columns.contains_key(container_id)
    }

    /// Items of a container; empty for unknown containers
    pub fn items_in(&self, container_id: &str) -> &[String] {
        self.columns
            .get(container_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len_of(&self, container_id: &str) -> usize {
        self.items_in(container_id).len()
    }

    /// Find `(container, index)` for an item
    pub fn locate(&self, item_id: &str) -> Option<(&str, usize)> {
        self.columns.iter().find_map(|(c, items)| {
            items
                .iter()
                .position(|i| i == item_id)
                .map(|idx| (c.as_str(), idx))
        })
    }

    pub fn contains_item(&self, item_id: &str) -> bool {
        self.locate(item_id).is_some()
    }

    pub fn item_count(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    /// Move an item to `position` in `container_id`, clamped to
    /// `[0, len]` of the target after removal. Returns an identical
    /// snapshot when the item or the container is unknown, or when the
    /// item already sits there.
    pub fn move_item(&self, item_id: &str, container_id: &str, position: usize) -> OrderSnapshot {
        let mut next = self.clone();
        next.move_in_place(item_id, container_id, position);
        next
    }

    /// In-place form of [`OrderSnapshot::move_item`]. Returns whether the order changed.
    pub(crate) fn move_in_place(&mut self, item_id: &str, container_id: &str, position: usize) -> bool {
        if !self.columns.contains_key(container_id) {
            return false;
        }
        let Some((source, index)) = self.locate(item_id) else {
            return false;
        };
        let source = source.to_string();

        let target_len = if source == container_id {
            self.len_of(container_id) - 1
        } else {
            self.len_of(container_id)
        };
        let position = position.min(target_len);
        if source == container_id && index == position {
            return false;
        }

        if let Some(items) = self.columns.get_mut(&source) {
            items.remove(index);
        }
        if let Some(items) = self.columns.get_mut(container_id) {
            items.insert(position, item_id.to_string());
        }
        true
    }

    /// Insert an item that is not yet present. No-op if it already exists
    /// anywhere or the container is unknown.
    pub(crate) fn insert_item(&mut self, item_id: &str, container_id: &str, position: usize) -> bool {
        if self.contains_item(item_id) {
            return false;
        }
        match self.columns.get_mut(container_id) {
            Some(items) => {
                let position = position.min(items.len());
                items.insert(position, item_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Remove an item, closing the gap. Returns the container it left.
    pub(crate) fn remove_item(&mut self, item_id: &str) -> Option<String> {
        let (container, index) = self.locate(item_id)?;
        let container = container.to_string();
        if let Some(items) = self.columns.get_mut(&container) {
            items.remove(index);
        }
        Some(container)
    }

    pub(crate) fn columns_mut(&mut self) -> &mut IndexMap<String, Vec<String>> {
        &mut self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OrderSnapshot {
        OrderSnapshot::from_columns([
            ("A", vec!["t1", "t2", "t3"]),
            ("B", vec![]),
        ])
    }

    #[test]
    fn test_move_across_containers() {
        let next = sample().move_item("t2", "B", 0);
        assert_eq!(next.items_in("A"), ["t1", "t3"]);
        assert_eq!(next.items_in("B"), ["t2"]);
    }

    #[test]
    fn test_move_clamps_position() {
        let next = sample().move_item("t1", "B", 99);
        assert_eq!(next.items_in("B"), ["t1"]);

        let next = sample().move_item("t1", "A", 99);
        assert_eq!(next.items_in("A"), ["t2", "t3", "t1"]);
    }

    #[test]
    fn test_move_within_container_down() {
        let next = sample().move_item("t1", "A", 1);
        assert_eq!(next.items_in("A"), ["t2", "t1", "t3"]);
    }

    #[test]
    fn test_move_same_place_is_noop() {
        let snap = sample();
        assert_eq!(snap.move_item("t2", "A", 1), snap);
    }

    #[test]
    fn test_move_unknown_item_or_container_is_noop() {
        let snap = sample();
        assert_eq!(snap.move_item("nope", "B", 0), snap);
        assert_eq!(snap.move_item("t1", "Z", 0), snap);
    }

    #[test]
    fn test_round_trip_restores_order() {
        let snap = sample();
        let there = snap.move_item("t3", "B", 0);
        let back = there.move_item("t3", "A", 2);
        assert_eq!(back, snap);
    }

    #[test]
    fn test_locate() {
        let snap = sample();
        assert_eq!(snap.locate("t3"), Some(("A", 2)));
        assert_eq!(snap.locate("t9"), None);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut snap = sample();
        assert!(snap.insert_item("t4", "B", 5));
        assert!(!snap.insert_item("t4", "A", 0));
        assert!(!snap.insert_item("t5", "Z", 0));
        assert_eq!(snap.items_in("B"), ["t4"]);
        assert_eq!(snap.remove_item("t2").as_deref(), Some("A"));
        assert_eq!(snap.remove_item("t2"), None);
        assert_eq!(snap.items_in("A"), ["t1", "t3"]);
    }
}
