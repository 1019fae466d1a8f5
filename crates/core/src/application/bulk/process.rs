// Poll-driven batch processing (claim -> execute -> record)

use super::execute::BatchExecutor;
use super::reclaim::StaleReclaimer;
use crate::domain::{BulkJob, BulkJobId, Caller};
use crate::error::{AppError, Result};
use crate::port::{BulkJobRepository, TimeProvider};
use tracing::{debug, info};

/// Advance a job by at most one batch.
///
/// Algorithm:
/// 1. Load the job as `caller` sees it (NotFound otherwise)
/// 2. Completed jobs are returned unchanged
/// 3. Everything accounted for but not completed: finalize
/// 4. Pick the next batch; if empty, try reclaiming one stale claim and pick again
/// 5. Claim the batch (compare-and-set). Losing the race returns the current state
/// 6. Execute and record each claimed item
///
/// Returns the job state after this call.
pub async fn execute(
    job_repo: &dyn BulkJobRepository,
    executor: &BatchExecutor,
    reclaimer: &StaleReclaimer,
    time_provider: &dyn TimeProvider,
    batch_size: usize,
    job_id: &BulkJobId,
    caller: &Caller,
) -> Result<BulkJob> {
    let mut job = load(job_repo, job_id, caller).await?;

    if job.is_completed() {
        return Ok(job);
    }

    if job.done_count() >= job.total_count {
        job_repo.finalize(job_id, time_provider.now_millis()).await?;
        info!(job_id = %job_id, total = job.total_count, "Bulk job finalized");
        return load(job_repo, job_id, caller).await;
    }

    let mut batch = job.next_batch(batch_size);
    if batch.is_empty() {
        if !reclaimer.reclaim_one(&job).await? {
            debug!(
                job_id = %job_id,
                claimed = job.claimed_ids.len(),
                "Nothing claimable, work in flight elsewhere"
            );
            return Ok(job);
        }

        job = load(job_repo, job_id, caller).await?;
        batch = job.next_batch(batch_size);
        if batch.is_empty() {
            return Ok(job);
        }
    }

    let claimed = job_repo
        .try_claim(job_id, &batch, time_provider.now_millis())
        .await?;
    if !claimed {
        debug!(job_id = %job_id, batch = ?batch, "Claim lost to a concurrent poller");
        return load(job_repo, job_id, caller).await;
    }

    executor.run(&job, &batch, caller).await?;

    let job = load(job_repo, job_id, caller).await?;
    if job.is_completed() {
        info!(
            job_id = %job_id,
            processed = job.processed_ids.len(),
            skipped = job.skipped_ids.len(),
            failed = job.failed_items.len(),
            "Bulk job completed"
        );
    } else {
        debug!(job_id = %job_id, progress = job.progress_percent, "Batch recorded");
    }

    Ok(job)
}

async fn load(
    job_repo: &dyn BulkJobRepository,
    job_id: &BulkJobId,
    caller: &Caller,
) -> Result<BulkJob> {
    job_repo
        .find_visible(job_id, caller)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Bulk job not found: {}", job_id)))
}
