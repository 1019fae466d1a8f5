// Managed Resource (item) as seen by the bulk engine

use serde::{Deserialize, Serialize};

/// Item identifier (opaque)
pub type ItemId = String;

/// Current state of a single item, as returned by the lookup collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: ItemId,
    pub owner_id: String,
    pub is_active: bool,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, is_active: bool) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            is_active,
        }
    }
}
