// Batch Executor: runs claimed items through the single-item mutation

use super::constants::MAX_ERROR_MESSAGE_LEN;
use crate::domain::{BulkJob, BulkOperation, Caller, ItemId, ItemOutcome};
use crate::error::Result;
use crate::port::{BulkJobRepository, ResourceLookup, ResourceMutator, TimeProvider};
use std::sync::Arc;
use tracing::{debug, warn};

/// Executes claimed ids one at a time, recording each outcome as it lands
pub struct BatchExecutor {
    job_repo: Arc<dyn BulkJobRepository>,
    lookup: Arc<dyn ResourceLookup>,
    mutator: Arc<dyn ResourceMutator>,
    time_provider: Arc<dyn TimeProvider>,
}

impl BatchExecutor {
    pub fn new(
        job_repo: Arc<dyn BulkJobRepository>,
        lookup: Arc<dyn ResourceLookup>,
        mutator: Arc<dyn ResourceMutator>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            job_repo,
            lookup,
            mutator,
            time_provider,
        }
    }

    /// Execute `batch` (already claimed by this caller) sequentially.
    ///
    /// Each outcome is written before the next item starts, so a crash
    /// mid-batch leaves only the unfinished ids claimed.
    pub async fn run(&self, job: &BulkJob, batch: &[ItemId], caller: &Caller) -> Result<()> {
        for item_id in batch {
            let outcome = self.execute_item(job.operation, item_id, caller).await?;
            let now = self.time_provider.now_millis();

            let recorded = self.job_repo.resolve(&job.id, item_id, &outcome, now).await?;
            if recorded {
                debug!(
                    job_id = %job.id,
                    item_id = %item_id,
                    outcome = outcome.label(),
                    "Item resolved"
                );
            } else {
                warn!(
                    job_id = %job.id,
                    item_id = %item_id,
                    outcome = outcome.label(),
                    "Claim was reclaimed before resolution, outcome dropped; \
                     a mutation already applied here is recorded as skipped by the re-run"
                );
            }
        }

        Ok(())
    }

    /// Classify one item.
    ///
    /// State is re-read right before mutating: an item that reached the
    /// target state after planning is skipped without calling the mutator.
    async fn execute_item(
        &self,
        operation: BulkOperation,
        item_id: &ItemId,
        caller: &Caller,
    ) -> Result<ItemOutcome> {
        if let Some(state) = self.lookup.find_state(item_id, caller).await? {
            if operation.is_satisfied_by(state.is_active) {
                return Ok(ItemOutcome::Skipped);
            }
        }

        match self.mutator.mutate(operation, item_id, caller).await {
            Ok(()) => Ok(ItemOutcome::Processed),
            Err(e) if e.is_benign() => {
                debug!(item_id = %item_id, reason = %e, "Mutation not needed");
                Ok(ItemOutcome::Skipped)
            }
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Item mutation failed");
                Ok(ItemOutcome::Failed(truncate_error(&e.to_string())))
            }
        }
    }
}

/// Keep at most `MAX_ERROR_MESSAGE_LEN` characters of an error message
pub fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}
