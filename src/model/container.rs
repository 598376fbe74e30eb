use serde::{Deserialize, Serialize};

use super::item::ItemRecord;

/// A column on the board. Item order lives in the snapshot, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub title: String,
    /// Display order among containers (`order_index` on the wire)
    pub rank: i64,
}

impl Container {
    pub fn new(id: impl Into<String>, title: impl Into<String>, rank: i64) -> Self {
        Container {
            id: id.into(),
            title: title.into(),
            rank,
        }
    }
}

/// A column as the backend returns it (`GET /boards/{id}/columns`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order_index: i64,
}

impl From<ContainerRecord> for Container {
    fn from(record: ContainerRecord) -> Self {
        Container {
            id: record.id,
            title: record.title,
            rank: record.order_index,
        }
    }
}

/// An authoritative image of one board: the resync payload, and the file
/// format read by the `bf` commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardData {
    #[serde(default)]
    pub columns: Vec<ContainerRecord>,
    #[serde(default)]
    pub tasks: Vec<ItemRecord>,
}
