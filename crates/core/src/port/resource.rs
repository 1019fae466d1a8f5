// Resource Ports: item lookup + single-item mutation
// The bulk engine only relies on the call contract of these collaborators.

use crate::domain::{BulkOperation, Caller, ItemId, ResourceState};
use crate::error::Result;
use async_trait::async_trait;
use thiserror::Error;

/// Classified failure of a single-item mutation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("Item is already in the requested state")]
    AlreadyInTargetState,

    /// Uniqueness or version conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl MutationError {
    /// Benign failures mean no work was needed; the item counts as skipped.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            MutationError::AlreadyInTargetState | MutationError::Conflict(_)
        )
    }
}

/// Reads current item state
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// Fetch states of `ids` visible to `scope`. Missing or invisible ids are simply absent.
    async fn find_states(&self, ids: &[ItemId], scope: &Caller) -> Result<Vec<ResourceState>>;

    /// Fetch one item's state
    async fn find_state(&self, id: &ItemId, scope: &Caller) -> Result<Option<ResourceState>> {
        Ok(self
            .find_states(std::slice::from_ref(id), scope)
            .await?
            .into_iter()
            .next())
    }
}

/// Applies an operation to one item, enforcing ownership unless the caller is privileged
#[async_trait]
pub trait ResourceMutator: Send + Sync {
    async fn mutate(
        &self,
        operation: BulkOperation,
        id: &ItemId,
        caller: &Caller,
    ) -> std::result::Result<(), MutationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory item store implementing both resource ports
    #[derive(Default)]
    pub struct InMemoryItemStore {
        items: Mutex<HashMap<ItemId, ResourceState>>,
        scripted: Mutex<HashMap<ItemId, MutationError>>,
        mutate_calls: Mutex<Vec<ItemId>>,
    }

    impl InMemoryItemStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_items(items: impl IntoIterator<Item = ResourceState>) -> Self {
            let store = Self::new();
            for item in items {
                store.put(item);
            }
            store
        }

        pub fn put(&self, item: ResourceState) {
            self.items.lock().unwrap().insert(item.id.clone(), item);
        }

        pub fn set_active(&self, id: &str, is_active: bool) {
            if let Some(item) = self.items.lock().unwrap().get_mut(id) {
                item.is_active = is_active;
            }
        }

        pub fn is_active(&self, id: &str) -> Option<bool> {
            self.items.lock().unwrap().get(id).map(|i| i.is_active)
        }

        /// Make every mutation of `id` fail with `error`
        pub fn fail_with(&self, id: &str, error: MutationError) {
            self.scripted.lock().unwrap().insert(id.to_string(), error);
        }

        /// Ids passed to `mutate`, in call order
        pub fn mutate_calls(&self) -> Vec<ItemId> {
            self.mutate_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceLookup for InMemoryItemStore {
        async fn find_states(&self, ids: &[ItemId], scope: &Caller) -> Result<Vec<ResourceState>> {
            let items = self.items.lock().unwrap();
            Ok(ids
                .iter()
                .filter_map(|id| items.get(id))
                .filter(|item| scope.can_access(&item.owner_id))
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl ResourceMutator for InMemoryItemStore {
        async fn mutate(
            &self,
            operation: BulkOperation,
            id: &ItemId,
            caller: &Caller,
        ) -> std::result::Result<(), MutationError> {
            self.mutate_calls.lock().unwrap().push(id.clone());

            if let Some(error) = self.scripted.lock().unwrap().get(id) {
                return Err(error.clone());
            }

            let mut items = self.items.lock().unwrap();
            let item = items
                .get_mut(id)
                .ok_or_else(|| MutationError::NotFound(id.clone()))?;

            if !caller.can_access(&item.owner_id) {
                return Err(MutationError::Forbidden(format!(
                    "{} does not own item {}",
                    caller.user_id, id
                )));
            }
            if operation.is_satisfied_by(item.is_active) {
                return Err(MutationError::AlreadyInTargetState);
            }

            item.is_active = operation.target_active();
            Ok(())
        }
    }
}
