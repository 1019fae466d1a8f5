//! Shared setup: a migrated SQLite file per test, removed on drop

#![allow(dead_code)]

use bulkops_core::application::{BulkEngineConfig, BulkJobService, CreateJobRequest};
use bulkops_core::domain::{BulkOperation, Caller, Role};
use bulkops_core::port::id_provider::UuidProvider;
use bulkops_core::port::time_provider::ManualTimeProvider;
use bulkops_infra_sqlite::{
    create_pool, run_migrations, NewItem, SqliteBulkJobRepository, SqliteItemStore,
};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

pub const START: i64 = 1_700_000_000_000;

pub struct TestDb {
    pub pool: SqlitePool,
    pub repo: Arc<SqliteBulkJobRepository>,
    pub items: Arc<SqliteItemStore>,
    pub clock: Arc<ManualTimeProvider>,
    path: PathBuf,
}

impl TestDb {
    pub async fn new() -> Self {
        let path = std::env::temp_dir().join(format!("bulkops-it-{}.db", uuid::Uuid::new_v4()));
        let pool = create_pool(&path.to_string_lossy()).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let clock = Arc::new(ManualTimeProvider::new(START));
        Self {
            repo: Arc::new(SqliteBulkJobRepository::new(pool.clone())),
            items: Arc::new(SqliteItemStore::new(pool.clone(), clock.clone())),
            pool,
            clock,
            path,
        }
    }

    /// A service instance over the shared store. Several of these model
    /// independent poller processes.
    pub fn service(&self) -> BulkJobService {
        self.service_with(BulkEngineConfig::default())
    }

    pub fn service_with(&self, config: BulkEngineConfig) -> BulkJobService {
        BulkJobService::new(
            self.repo.clone(),
            self.items.clone(),
            self.items.clone(),
            Arc::new(UuidProvider),
            self.clock.clone(),
            config,
        )
    }

    /// Seed `count` items named `{prefix}-{n}` owned by `owner`
    pub async fn seed(&self, owner: &str, prefix: &str, count: usize) -> Vec<String> {
        let mut ids = Vec::with_capacity(count);
        for n in 0..count {
            let id = format!("{}-{}", prefix, n);
            self.items
                .insert_item(&NewItem::new(id.clone(), owner, format!("Item {}", n)))
                .await
                .unwrap();
            ids.push(id);
        }
        ids
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub fn editor(user: &str) -> Caller {
    Caller::new(user, Role::Editor)
}

pub fn request(operation: BulkOperation, ids: &[String]) -> CreateJobRequest {
    CreateJobRequest {
        operation,
        item_ids: ids.to_vec(),
        payload: None,
    }
}
