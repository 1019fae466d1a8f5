//! SDK Request/Response Types
//!
//! Mirrors the JSON-RPC types from api-rpc crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

/// Identity attached to every bulk request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperation {
    Delete,
    Activate,
    Deactivate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
}

/// Request to plan a bulk job
#[derive(Debug, Clone, Serialize)]
pub struct CreateJobRequest {
    pub caller: Caller,
    pub operation: BulkOperation,
    pub item_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Response from bulk.create.v1
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub total_items: usize,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct JobRequest<'a> {
    pub caller: &'a Caller,
    pub job_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FailedItem {
    pub id: String,
    pub error: String,
}

/// Job state returned by poll and get
#[derive(Debug, Clone, Deserialize)]
pub struct JobView {
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

impl JobView {
    pub fn is_complete(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Response from admin.stats.v1
#[derive(Debug, Clone, Deserialize)]
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

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatsRequest<'a> {
    pub caller: &'a Caller,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MaintenanceRequest<'a> {
    pub caller: &'a Caller,
    pub force_vacuum: bool,
}

/// Response from admin.maintenance.v1
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceResponse {
    pub vacuum_run: bool,
    pub jobs_purged: i64,
    pub db_size_before: i64,
    pub db_size_after: i64,
}
