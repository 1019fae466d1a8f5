//! Bulkops SDK - Rust Client Library
//!
//! Plans bulk jobs and drives them to completion against a running daemon.
//!
//! # Example
//!
//! ```no_run
//! use bulkops_sdk::{BulkOperation, BulkopsClient, Caller, CreateJobRequest, Role};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BulkopsClient::connect("http://127.0.0.1:9630").await?;
//!     let caller = Caller::new("u1", Role::Editor);
//!
//!     let created = client.create_job(CreateJobRequest {
//!         caller: caller.clone(),
//!         operation: BulkOperation::Delete,
//!         item_ids: vec!["a".into(), "b".into(), "c".into()],
//!         payload: None,
//!     }).await?;
//!
//!     let done = client
//!         .watch_until_complete(&caller, &created.job_id, Duration::from_secs(2), 100)
//!         .await?;
//!     println!("{} processed, {} failed", done.summary.success, done.summary.failed);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::BulkopsClient;
pub use error::{code, Result, SdkError};
pub use types::{
    BulkOperation, Caller, CreateJobRequest, CreateJobResponse, FailedItem, JobStatus, JobSummary,
    JobView, MaintenanceResponse, Role, StatsResponse,
};
