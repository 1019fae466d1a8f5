//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results. Every bulk method carries the
//! caller identity handed over by the upstream auth layer.

use bulkops_core::domain::{BulkJob, BulkOperation, Caller, FailedItem, JobStatus};
use serde::{Deserialize, Serialize};

/// bulk.create.v1 - Plan a bulk job
#[derive(Debug, Deserialize)]
pub struct CreateBulkJobRequest {
    pub caller: Caller,
    pub operation: BulkOperation,
    pub item_ids: Vec<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateBulkJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub total_items: usize,
}

/// bulk.poll.v1 / bulk.get.v1 - Address one job
#[derive(Debug, Deserialize)]
pub struct JobRequest {
    pub caller: Caller,
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Job state as returned by poll and get
#[derive(Debug, Clone, Serialize)]
pub struct BulkJobView {
    pub job_id: String,
    pub operation: BulkOperation,
    pub status: JobStatus,
    pub progress: u8,
    pub summary: JobSummary,
    pub skipped_ids: Vec<String>,
    pub failures: Vec<FailedItem>,
    pub created_at: i64,
    pub last_updated_at: i64,
    pub expires_at: i64,
}

impl From<&BulkJob> for BulkJobView {
    fn from(job: &BulkJob) -> Self {
        Self {
            job_id: job.id.clone(),
            operation: job.operation,
            status: job.status,
            progress: job.progress_percent,
            summary: JobSummary {
                total: job.total_count,
                success: job.processed_ids.len(),
                failed: job.failed_items.len(),
                skipped: job.skipped_ids.len(),
            },
            skipped_ids: job.skipped_ids.clone(),
            failures: job.failed_items.clone(),
            created_at: job.created_at,
            last_updated_at: job.last_updated_at,
            expires_at: job.expires_at,
        }
    }
}

/// admin.stats.v1 - Get system statistics (ADMIN only)
#[derive(Debug, Deserialize)]
pub struct StatsRequest {
    pub caller: Caller,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub pending_jobs: i64,
    pub processing_jobs: i64,
    pub completed_jobs: i64,
    pub expired_jobs: i64,
    pub item_count: i64,
    pub db_size_bytes: i64,
    pub uptime_seconds: i64,
}

/// admin.maintenance.v1 - Run manual maintenance (ADMIN only)
#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    pub caller: Caller,
    #[serde(default)]
    pub force_vacuum: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceResponse {
    pub vacuum_run: bool,
    pub jobs_purged: i64,
    pub db_size_before: i64,
    pub db_size_after: i64,
}
