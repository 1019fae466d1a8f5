// Bulk Job Service
// Thin wrapper over the plan / process use cases

pub mod constants;
pub mod execute;
pub mod plan;
pub mod process;
pub mod reclaim;


use crate::domain::{BulkJob, BulkJobId, Caller};
use crate::error::{AppError, Result};
use crate::port::{BulkJobRepository, IdProvider, ResourceLookup, ResourceMutator, TimeProvider};
use constants::{BATCH_SIZE, JOB_TTL_MS, STALE_CLAIM_MS};
use execute::BatchExecutor;
use reclaim::StaleReclaimer;
use std::sync::Arc;

pub use plan::CreateJobRequest;

/// Tunables of the bulk engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkEngineConfig {
    pub batch_size: usize,
    pub stale_claim_ms: i64,
    pub job_ttl_ms: i64,
}

impl Default for BulkEngineConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            stale_claim_ms: STALE_CLAIM_MS,
            job_ttl_ms: JOB_TTL_MS,
        }
    }
}

/// Bulk job service
///
/// Owns no state of its own: everything a poll needs is in the job record,
/// so any number of service instances may serve the same job.
pub struct BulkJobService {
    job_repo: Arc<dyn BulkJobRepository>,
    lookup: Arc<dyn ResourceLookup>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    executor: BatchExecutor,
    reclaimer: StaleReclaimer,
    config: BulkEngineConfig,
}

impl BulkJobService {
    pub fn new(
        job_repo: Arc<dyn BulkJobRepository>,
        lookup: Arc<dyn ResourceLookup>,
        mutator: Arc<dyn ResourceMutator>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: BulkEngineConfig,
    ) -> Self {
        let executor = BatchExecutor::new(
            job_repo.clone(),
            lookup.clone(),
            mutator,
            time_provider.clone(),
        );
        let reclaimer =
            StaleReclaimer::new(job_repo.clone(), time_provider.clone(), config.stale_claim_ms);

        Self {
            job_repo,
            lookup,
            id_provider,
            time_provider,
            executor,
            reclaimer,
            config,
        }
    }

    /// Plan a job for `caller`. No item is touched.
    pub async fn create_job(&self, caller: &Caller, req: CreateJobRequest) -> Result<BulkJob> {
        plan::execute(
            self.job_repo.as_ref(),
            self.lookup.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            self.config.job_ttl_ms,
            caller,
            req,
        )
        .await
    }

    /// Poll: advance the job by at most one batch and return its state
    pub async fn process_next_batch(&self, job_id: &BulkJobId, caller: &Caller) -> Result<BulkJob> {
        process::execute(
            self.job_repo.as_ref(),
            &self.executor,
            &self.reclaimer,
            self.time_provider.as_ref(),
            self.config.batch_size,
            job_id,
            caller,
        )
        .await
    }

    /// Read-only view; never claims or executes
    pub async fn get_job(&self, job_id: &BulkJobId, caller: &Caller) -> Result<BulkJob> {
        self.job_repo
            .find_visible(job_id, caller)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bulk job not found: {}", job_id)))
    }

    pub fn config(&self) -> &BulkEngineConfig {
        &self.config
    }
}
