// Bulkops Infrastructure - SQLite Adapter
// Implements: BulkJobRepository, ResourceLookup + ResourceMutator (items), Maintenance

mod bulk_job_repository;
mod connection;
mod error;
mod item_store;
mod maintenance_impl;
mod migration;

pub use bulk_job_repository::SqliteBulkJobRepository;
pub use connection::create_pool;
pub use item_store::{NewItem, SqliteItemStore, StoredItem};
pub use maintenance_impl::SqliteMaintenance;
pub use migration::run_migrations;
