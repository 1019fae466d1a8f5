// SQLite item store: the managed resources bulk jobs act on
// Implements: ResourceLookup, ResourceMutator

use crate::error::{is_unique_violation, map_sqlx_error};
use async_trait::async_trait;
use bulkops_core::domain::{BulkOperation, Caller, ItemId, ResourceState};
use bulkops_core::error::Result;
use bulkops_core::port::{MutationError, ResourceLookup, ResourceMutator, TimeProvider};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

/// Item to seed into the store
#[derive(Debug, Clone)]
pub struct NewItem {
    pub id: ItemId,
    pub owner_id: String,
    pub name: String,
}

impl NewItem {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            name: name.into(),
        }
    }
}

/// Full stored row
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredItem {
    pub id: ItemId,
    pub owner_id: String,
    pub name: String,
    pub is_active: bool,
    pub deleted_at: Option<i64>,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(sqlx::FromRow)]
struct StateRow {
    id: String,
    owner_id: String,
    is_active: bool,
}

pub struct SqliteItemStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteItemStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Insert an active item. Duplicate ids surface as `AppError::Conflict`.
    pub async fn insert_item(&self, item: &NewItem) -> Result<()> {
        let now = self.time_provider.now_millis();

        sqlx::query(
            r#"
            INSERT INTO items (id, owner_id, name, is_active, version, created_at, updated_at)
            VALUES (?, ?, ?, 1, 1, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.owner_id)
        .bind(&item.name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    pub async fn find_item(&self, id: &str) -> Result<Option<StoredItem>> {
        sqlx::query_as::<_, StoredItem>("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    pub async fn count_items(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    /// Explain why a conditional mutation touched no row
    async fn classify_miss(
        &self,
        operation: BulkOperation,
        id: &ItemId,
        caller: &Caller,
    ) -> std::result::Result<(), MutationError> {
        let row = sqlx::query_as::<_, StateRow>(
            "SELECT id, owner_id, is_active FROM items WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            None => Err(MutationError::NotFound(id.clone())),
            Some(row) if !caller.can_access(&row.owner_id) => Err(MutationError::Forbidden(
                format!("{} does not own {}", caller.user_id, row.id),
            )),
            Some(row) if operation.is_satisfied_by(row.is_active) => {
                Err(MutationError::AlreadyInTargetState)
            }
            // Row flipped between our UPDATE and this read
            Some(_) => Err(MutationError::Conflict(format!(
                "Item {} changed concurrently",
                id
            ))),
        }
    }
}

fn storage_error(err: sqlx::Error) -> MutationError {
    if is_unique_violation(&err) {
        MutationError::Conflict(err.to_string())
    } else {
        MutationError::Storage(err.to_string())
    }
}

#[async_trait]
impl ResourceLookup for SqliteItemStore {
    async fn find_states(&self, ids: &[ItemId], scope: &Caller) -> Result<Vec<ResourceState>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id, owner_id, is_active FROM items WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        if !scope.is_privileged() {
            builder.push(" AND owner_id = ").push_bind(scope.user_id.as_str());
        }

        let rows = builder
            .build_query_as::<StateRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|r| ResourceState::new(r.id, r.owner_id, r.is_active))
            .collect())
    }
}

#[async_trait]
impl ResourceMutator for SqliteItemStore {
    /// Soft delete / deactivate / activate in one conditional UPDATE.
    ///
    /// The WHERE clause carries the ownership rule and the "needs work"
    /// check, so a zero row count is classified afterwards.
    async fn mutate(
        &self,
        operation: BulkOperation,
        id: &ItemId,
        caller: &Caller,
    ) -> std::result::Result<(), MutationError> {
        let now = self.time_provider.now_millis();

        let sql = match operation {
            BulkOperation::Delete | BulkOperation::Deactivate => {
                r#"
                UPDATE items
                SET is_active = 0, deleted_at = ?, version = version + 1, updated_at = ?
                WHERE id = ? AND is_active = 1 AND (? OR owner_id = ?)
                "#
            }
            BulkOperation::Activate => {
                r#"
                UPDATE items
                SET is_active = 1, deleted_at = NULL, version = version + 1, updated_at = ?
                WHERE id = ? AND is_active = 0 AND (? OR owner_id = ?)
                "#
            }
        };

        let mut query = sqlx::query(sql);
        if !operation.target_active() {
            query = query.bind(now);
        }
        let result = query
            .bind(now)
            .bind(id)
            .bind(caller.is_privileged())
            .bind(&caller.user_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        self.classify_miss(operation, id, caller).await
    }
}
