// Bulk Job Repository Port (Interface)

use crate::domain::{BulkJob, BulkJobId, Caller, ItemId, ItemOutcome, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence for bulk jobs.
///
/// Every mutating method must be a single atomic, conditional update against
/// the stored record. A plain read-then-write is never acceptable here: several
/// pollers may hit the same job at once.
#[async_trait]
pub trait BulkJobRepository: Send + Sync {
    /// Insert a freshly planned job
    async fn insert(&self, job: &BulkJob) -> Result<()>;

    /// Find a job by ID, scoped to what `caller` may see
    async fn find_visible(&self, id: &BulkJobId, caller: &Caller) -> Result<Option<BulkJob>>;

    /// Claim `item_ids` for the current caller.
    ///
    /// Compare-and-set: succeeds only if every id is still pending, in which
    /// case all of them become claimed and `last_updated_at` is bumped.
    /// Returns `false` (and changes nothing) otherwise.
    async fn try_claim(&self, id: &BulkJobId, item_ids: &[ItemId], now_millis: i64)
        -> Result<bool>;

    /// Move one claimed item into its final bucket and recompute progress.
    ///
    /// Returns `false` if the item was no longer claimed (reclaimed and
    /// resolved by someone else).
    async fn resolve(
        &self,
        id: &BulkJobId,
        item_id: &ItemId,
        outcome: &ItemOutcome,
        now_millis: i64,
    ) -> Result<bool>;

    /// Return one claimed item to the pending pool, but only while the job's
    /// `last_updated_at` is still older than `stale_before`.
    async fn release_stale_claim(
        &self,
        id: &BulkJobId,
        item_id: &ItemId,
        stale_before: i64,
        now_millis: i64,
    ) -> Result<bool>;

    /// Mark the job completed (progress 100). Only called once every id is
    /// resolved, so no live claim can remain.
    async fn finalize(&self, id: &BulkJobId, now_millis: i64) -> Result<()>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory job store. The mutex makes every method atomic.
    #[derive(Default)]
    pub struct InMemoryBulkJobRepository {
        jobs: Mutex<HashMap<BulkJobId, BulkJob>>,
        preempt: Mutex<Option<Vec<ItemId>>>,
        claim_attempts: AtomicUsize,
    }

    impl InMemoryBulkJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Snapshot of a stored job, bypassing visibility rules
        pub fn get(&self, id: &str) -> Option<BulkJob> {
            self.jobs.lock().unwrap().get(id).cloned()
        }

        /// Simulate a concurrent poller that claims `ids` right before the next claim attempt
        pub fn preempt_next_claim(&self, ids: Vec<ItemId>) {
            *self.preempt.lock().unwrap() = Some(ids);
        }

        /// Overwrite `last_updated_at` (for staleness tests)
        pub fn set_last_updated_at(&self, id: &str, millis: i64) {
            if let Some(job) = self.jobs.lock().unwrap().get_mut(id) {
                job.last_updated_at = millis;
            }
        }

        pub fn claim_attempts(&self) -> usize {
            self.claim_attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BulkJobRepository for InMemoryBulkJobRepository {
        async fn insert(&self, job: &BulkJob) -> Result<()> {
            self.jobs
                .lock()
                .unwrap()
                .insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn find_visible(&self, id: &BulkJobId, caller: &Caller) -> Result<Option<BulkJob>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .get(id)
                .filter(|job| job.is_visible_to(caller))
                .cloned())
        }

        async fn try_claim(
            &self,
            id: &BulkJobId,
            item_ids: &[ItemId],
            now_millis: i64,
        ) -> Result<bool> {
            self.claim_attempts.fetch_add(1, Ordering::SeqCst);
            let mut jobs = self.jobs.lock().unwrap();
            let Some(job) = jobs.get_mut(id) else {
                return Ok(false);
            };

            if let Some(stolen) = self.preempt.lock().unwrap().take() {
                job.try_claim(&stolen, now_millis);
            }

            Ok(job.try_claim(item_ids, now_millis))
        }

        async fn resolve(
            &self,
            id: &BulkJobId,
            item_id: &ItemId,
            outcome: &ItemOutcome,
            now_millis: i64,
        ) -> Result<bool> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .get_mut(id)
                .map(|job| job.resolve(item_id, outcome, now_millis))
                .unwrap_or(false))
        }

        async fn release_stale_claim(
            &self,
            id: &BulkJobId,
            item_id: &ItemId,
            stale_before: i64,
            now_millis: i64,
        ) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(id) {
                Some(job) if job.last_updated_at < stale_before => {
                    Ok(job.release_claim(item_id, now_millis))
                }
                _ => Ok(false),
            }
        }

        async fn finalize(&self, id: &BulkJobId, now_millis: i64) -> Result<()> {
            if let Some(job) = self.jobs.lock().unwrap().get_mut(id) {
                job.finalize(now_millis);
            }
            Ok(())
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|job| job.status == status)
                .count() as i64)
        }
    }
}
