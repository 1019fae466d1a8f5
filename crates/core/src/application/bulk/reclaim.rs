// Stale claim recovery
use crate::domain::BulkJob;
use crate::error::Result;
use crate::port::{BulkJobRepository, TimeProvider};
use std::sync::Arc;
use tracing::{debug, warn};

/// Returns abandoned claims to the pending pool.
///
/// A poller that dies between claiming and resolving leaves its ids
/// claimed forever. Once the job record has been idle past the threshold,
/// the next poller frees one claimed id and works on it.
pub struct StaleReclaimer {
    job_repo: Arc<dyn BulkJobRepository>,
    time_provider: Arc<dyn TimeProvider>,
    stale_claim_ms: i64,
}

impl StaleReclaimer {
    pub fn new(
        job_repo: Arc<dyn BulkJobRepository>,
        time_provider: Arc<dyn TimeProvider>,
        stale_claim_ms: i64,
    ) -> Self {
        Self {
            job_repo,
            time_provider,
            stale_claim_ms,
        }
    }

    /// Release the first claimed id (in target order) if the job is stale.
    ///
    /// The release itself is conditional on the job still being stale, so of
    /// several pollers noticing at once only one frees the id. Releasing
    /// bumps `last_updated_at`; the remaining claims wait for another window.
    ///
    /// # Returns
    /// `true` if an id was released
    pub async fn reclaim_one(&self, job: &BulkJob) -> Result<bool> {
        let now = self.time_provider.now_millis();
        if !job.has_stale_claims(now, self.stale_claim_ms) {
            return Ok(false);
        }

        let Some(item_id) = job.claimed_ids.first() else {
            return Ok(false);
        };

        let released = self
            .job_repo
            .release_stale_claim(&job.id, item_id, now - self.stale_claim_ms, now)
            .await?;

        if released {
            warn!(
                job_id = %job.id,
                item_id = %item_id,
                idle_ms = now - job.last_updated_at,
                remaining_claims = job.claimed_ids.len() - 1,
                "Reclaimed stale claim"
            );
        } else {
            debug!(job_id = %job.id, "Stale claim already handled by another poller");
        }

        Ok(released)
    }
}
