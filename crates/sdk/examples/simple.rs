//! Simple SDK Example
//!
//! Plans a bulk deactivation and polls it to completion.
//!
//! # Usage
//!
//! 1. Start the daemon:
//!    ```bash
//!    cargo run --package bulkops-daemon
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --example simple -- item-1 item-2 item-3
//!    ```

use bulkops_sdk::{BulkOperation, BulkopsClient, Caller, CreateJobRequest, Role};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let item_ids: Vec<String> = std::env::args().skip(1).collect();
    if item_ids.is_empty() {
        eprintln!("usage: simple <item-id>...");
        return Ok(());
    }

    println!("Bulkops SDK - Simple Example");
    println!("============================\n");

    let client = BulkopsClient::connect("http://127.0.0.1:9630").await?;
    let caller = Caller::new("example-user", Role::Editor);

    let created = client
        .create_job(CreateJobRequest {
            caller: caller.clone(),
            operation: BulkOperation::Deactivate,
            item_ids,
            payload: None,
        })
        .await?;

    println!("✓ Job planned:");
    println!("  - ID: {}", created.job_id);
    println!("  - Items: {}", created.total_items);
    println!("  - Progress: {}%\n", created.progress);

    let done = client
        .watch_until_complete(&caller, &created.job_id, Duration::from_millis(500), 1_000)
        .await?;

    println!("✓ Job completed:");
    println!("  - Processed: {}", done.summary.success);
    println!("  - Skipped: {}", done.summary.skipped);
    println!("  - Failed: {}", done.summary.failed);
    for failure in &done.failures {
        println!("    | {}: {}", failure.id, failure.error);
    }

    Ok(())
}
