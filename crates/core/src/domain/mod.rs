// Domain Layer - Pure business logic and entities

pub mod caller;
pub mod error;
pub mod job;
pub mod resource;

// Re-exports
pub use caller::{Caller, Role};
pub use error::DomainError;
pub use job::{
    dedupe_ids, derive_progress, BulkJob, BulkJobId, BulkOperation, FailedItem, ItemOutcome,
    JobPayload, JobStatus, NewBulkJob,
};
pub use resource::{ItemId, ResourceState};
