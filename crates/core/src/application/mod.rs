// Application Layer - Use Cases and Business Logic

pub mod bulk;
pub mod maintenance;
pub mod shutdown;

// Re-exports
pub use bulk::{BulkEngineConfig, BulkJobService, CreateJobRequest};
pub use maintenance::MaintenanceScheduler;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
