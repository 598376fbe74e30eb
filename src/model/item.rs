use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An orderable card on the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Opaque id assigned by the backend
    pub id: String,
    /// Owning container (column)
    pub container_id: String,
    /// Dense zero-based index within the container
    pub position: usize,
    pub title: String,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Create an item with no timestamps
    pub fn new(id: impl Into<String>, container_id: impl Into<String>, title: impl Into<String>) -> Self {
        Item {
            id: id.into(),
            container_id: container_id.into(),
            position: 0,
            title: title.into(),
            description: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Wire form of this item
    pub fn to_record(&self) -> ItemRecord {
        ItemRecord {
            id: self.id.clone(),
            column_id: self.container_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            position: self.position as i64,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// An item as the backend returns it (`GET /boards/{id}/tasks`, `PATCH /tasks/{id}/move`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub column_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Signed on the wire; negative values clamp to the top of the column
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ItemRecord {
    /// Position clamped to a non-negative index
    pub fn index(&self) -> usize {
        self.position.max(0) as usize
    }

    /// Convert into a model item. The position is provisional until the
    /// owning container is reindexed.
    pub fn into_item(self) -> Item {
        let position = self.index();
        Item {
            id: self.id,
            container_id: self.column_id,
            position,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
