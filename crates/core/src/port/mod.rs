// Port Layer - Interfaces for external dependencies

pub mod bulk_job_repository;
pub mod id_provider; // For deterministic testing
pub mod maintenance;
pub mod resource;
pub mod time_provider;

// Re-exports
pub use bulk_job_repository::BulkJobRepository;
pub use id_provider::IdProvider;
pub use maintenance::{Maintenance, MaintenanceConfig, MaintenanceStats};
pub use resource::{MutationError, ResourceLookup, ResourceMutator};
pub use time_provider::TimeProvider;
