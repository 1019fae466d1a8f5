// Bulk Job Domain Model

use crate::domain::caller::Caller;
use crate::domain::error::DomainError;
use crate::domain::resource::{ItemId, ResourceState};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Bulk job ID (UUID v4)
pub type BulkJobId = String;

/// Operation applied to every member of a job's input set (immutable after creation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperation {
    Delete,
    Activate,
    Deactivate,
}

impl BulkOperation {
    /// Active flag an item ends up with once the operation succeeded
    pub fn target_active(self) -> bool {
        matches!(self, BulkOperation::Activate)
    }

    /// True when an item in `is_active` state needs no work
    pub fn is_satisfied_by(self, is_active: bool) -> bool {
        is_active == self.target_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BulkOperation::Delete => "delete",
            BulkOperation::Activate => "activate",
            BulkOperation::Deactivate => "deactivate",
        }
    }
}

impl std::fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BulkOperation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete" => Ok(BulkOperation::Delete),
            "activate" => Ok(BulkOperation::Activate),
            "deactivate" => Ok(BulkOperation::Deactivate),
            other => Err(DomainError::UnknownOperation(other.to_string())),
        }
    }
}

/// Job status. Derived from bucket sizes, never set by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Operation-specific auxiliary data, opaque to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn empty() -> Self {
        Self(serde_json::json!({}))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// An item whose mutation failed for a non-benign reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub id: ItemId,
    pub error: String,
}

/// Final accounting of one claimed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Processed,
    Skipped,
    Failed(String),
}

impl ItemOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Processed => "processed",
            ItemOutcome::Skipped => "skipped",
            ItemOutcome::Failed(_) => "failed",
        }
    }
}

/// Maps a done-count onto `(status, progress_percent)`.
///
/// Progress rounds half up and only reaches 100 on completion, so a job that
/// still has unresolved items never reports 100%. Plain rounding would show
/// 100 at 199/200; the cap at 99 keeps "100" and "completed" in lockstep.
pub fn derive_progress(done: usize, total: usize) -> (JobStatus, u8) {
    if total == 0 || done >= total {
        return (JobStatus::Completed, 100);
    }

    let (done, total) = (done as u64, total as u64);
    let percent = ((done * 200 + total) / (total * 2)).min(99) as u8;

    let status = if done == 0 {
        JobStatus::Pending
    } else {
        JobStatus::Processing
    };

    (status, percent)
}

/// Collapse duplicate ids, keeping first-seen order
pub fn dedupe_ids(ids: &[ItemId]) -> Vec<ItemId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Everything the planner needs besides the looked-up item states
#[derive(Debug, Clone)]
pub struct NewBulkJob {
    pub id: BulkJobId,
    pub owner_id: String,
    pub operation: BulkOperation,
    pub requested_ids: Vec<ItemId>,
    pub payload: JobPayload,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Bulk Job Entity
///
/// Every distinct requested id lives in exactly one of: pending (a target not
/// yet claimed or resolved), `claimed_ids`, `processed_ids`, `skipped_ids`,
/// `failed_items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkJob {
    pub id: BulkJobId,
    pub owner_id: String,
    pub operation: BulkOperation,

    /// Ids that needed work at plan time, in request order
    pub target_ids: Vec<ItemId>,
    pub claimed_ids: Vec<ItemId>,
    pub processed_ids: Vec<ItemId>,
    pub skipped_ids: Vec<ItemId>,
    pub failed_items: Vec<FailedItem>,

    pub payload: JobPayload,
    pub status: JobStatus,
    pub total_count: usize,
    pub progress_percent: u8,

    pub created_at: i64, // epoch ms
    pub last_updated_at: i64,
    pub expires_at: i64,
}

impl BulkJob {
    /// Classify requested ids into targets and skips.
    ///
    /// `found` holds the states visible to the owner. Ids absent from it and
    /// ids already in the operation's target state are skipped up front.
    pub fn plan(new: NewBulkJob, found: &[ResourceState]) -> Self {
        let requested = dedupe_ids(&new.requested_ids);
        let states: HashMap<&str, &ResourceState> =
            found.iter().map(|s| (s.id.as_str(), s)).collect();

        let mut target_ids = Vec::new();
        let mut skipped_ids = Vec::new();

        for id in &requested {
            match states.get(id.as_str()) {
                Some(state) if !new.operation.is_satisfied_by(state.is_active) => {
                    target_ids.push(id.clone())
                }
                _ => skipped_ids.push(id.clone()),
            }
        }

        let mut job = Self {
            id: new.id,
            owner_id: new.owner_id,
            operation: new.operation,
            target_ids,
            claimed_ids: Vec::new(),
            processed_ids: Vec::new(),
            skipped_ids,
            failed_items: Vec::new(),
            payload: new.payload,
            status: JobStatus::Pending,
            total_count: requested.len(),
            progress_percent: 0,
            created_at: new.created_at,
            last_updated_at: new.created_at,
            expires_at: new.expires_at,
        };
        job.refresh_progress();
        job
    }

    pub fn done_count(&self) -> usize {
        self.processed_ids.len() + self.skipped_ids.len() + self.failed_items.len()
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn is_visible_to(&self, caller: &Caller) -> bool {
        caller.can_access(&self.owner_id)
    }

    fn resolved_set(&self) -> HashSet<&str> {
        self.processed_ids
            .iter()
            .chain(self.skipped_ids.iter())
            .map(String::as_str)
            .chain(self.failed_items.iter().map(|f| f.id.as_str()))
            .collect()
    }

    pub fn is_resolved(&self, id: &str) -> bool {
        self.resolved_set().contains(id)
    }

    /// Targets that are neither resolved nor claimed, in target order
    pub fn available_ids(&self) -> Vec<ItemId> {
        let mut excluded = self.resolved_set();
        excluded.extend(self.claimed_ids.iter().map(String::as_str));

        self.target_ids
            .iter()
            .filter(|id| !excluded.contains(id.as_str()))
            .cloned()
            .collect()
    }

    /// Candidate batch: up to `limit` available ids
    pub fn next_batch(&self, limit: usize) -> Vec<ItemId> {
        let mut ids = self.available_ids();
        ids.truncate(limit);
        ids
    }

    /// A claim is stale when claims exist but the record has not moved for longer than `threshold_ms`
    pub fn has_stale_claims(&self, now_millis: i64, threshold_ms: i64) -> bool {
        !self.claimed_ids.is_empty() && now_millis - self.last_updated_at > threshold_ms
    }

    /// Recompute `status` and `progress_percent` from the buckets
    pub fn refresh_progress(&mut self) {
        let (status, percent) = derive_progress(self.done_count(), self.total_count);
        self.status = status;
        self.progress_percent = percent;
    }

    /// Compare-and-set claim: all of `ids` become claimed, or none do.
    ///
    /// Fails when any id is already claimed, resolved, or not a target.
    pub fn try_claim(&mut self, ids: &[ItemId], now_millis: i64) -> bool {
        let available: HashSet<ItemId> = self.available_ids().into_iter().collect();
        if ids.is_empty() || !ids.iter().all(|id| available.contains(id)) {
            return false;
        }

        self.claimed_ids.extend(ids.iter().cloned());
        self.sort_claims();
        self.last_updated_at = now_millis;
        true
    }

    /// Move one claimed id into its final bucket. No-op unless the id is currently claimed.
    pub fn resolve(&mut self, id: &str, outcome: &ItemOutcome, now_millis: i64) -> bool {
        let Some(pos) = self.claimed_ids.iter().position(|c| c == id) else {
            return false;
        };
        let id = self.claimed_ids.remove(pos);

        match outcome {
            ItemOutcome::Processed => self.processed_ids.push(id),
            ItemOutcome::Skipped => self.skipped_ids.push(id),
            ItemOutcome::Failed(error) => self.failed_items.push(FailedItem {
                id,
                error: error.clone(),
            }),
        }

        self.last_updated_at = now_millis;
        self.refresh_progress();
        true
    }

    /// Return one claimed id to the pending pool
    pub fn release_claim(&mut self, id: &str, now_millis: i64) -> bool {
        let Some(pos) = self.claimed_ids.iter().position(|c| c == id) else {
            return false;
        };
        self.claimed_ids.remove(pos);
        self.last_updated_at = now_millis;
        true
    }

    /// Terminal transition once every id is accounted for
    pub fn finalize(&mut self, now_millis: i64) {
        self.claimed_ids.clear();
        self.status = JobStatus::Completed;
        self.progress_percent = 100;
        self.last_updated_at = now_millis;
    }

    fn sort_claims(&mut self) {
        let order: HashMap<&str, usize> = self
            .target_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut claimed = std::mem::take(&mut self.claimed_ids);
        claimed.sort_by_key(|id| order.get(id.as_str()).copied().unwrap_or(usize::MAX));
        self.claimed_ids = claimed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ItemId> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn new_job(operation: BulkOperation, requested: &[&str]) -> NewBulkJob {
        NewBulkJob {
            id: "job-1".to_string(),
            owner_id: "alice".to_string(),
            operation,
            requested_ids: ids(requested),
            payload: JobPayload::empty(),
            created_at: 1_000,
            expires_at: 1_000 + 86_400_000,
        }
    }

    #[test]
    fn test_derive_progress_rounds_half_up() {
        assert_eq!(derive_progress(0, 4), (JobStatus::Pending, 0));
        assert_eq!(derive_progress(1, 8), (JobStatus::Processing, 13)); // 12.5
        assert_eq!(derive_progress(1, 3), (JobStatus::Processing, 33));
        assert_eq!(derive_progress(2, 3), (JobStatus::Processing, 67));
        assert_eq!(derive_progress(3, 3), (JobStatus::Completed, 100));
    }

    #[test]
    fn test_derive_progress_never_reports_100_while_unfinished() {
        assert_eq!(derive_progress(999, 1000), (JobStatus::Processing, 99));
        // 99.5 would round to 100
        assert_eq!(derive_progress(199, 200), (JobStatus::Processing, 99));
        assert_eq!(derive_progress(200, 200), (JobStatus::Completed, 100));
    }

    #[test]
    fn test_plan_skips_already_inactive_for_deactivate() {
        let found = vec![
            ResourceState::new("a", "alice", true),
            ResourceState::new("b", "alice", false),
            ResourceState::new("c", "alice", true),
            ResourceState::new("d", "alice", false),
            ResourceState::new("e", "alice", true),
        ];
        let job = BulkJob::plan(
            new_job(BulkOperation::Deactivate, &["a", "b", "c", "d", "e"]),
            &found,
        );

        assert_eq!(job.target_ids, ids(&["a", "c", "e"]));
        assert_eq!(job.skipped_ids, ids(&["b", "d"]));
        assert_eq!(job.total_count, 5);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress_percent, 40);
    }

    #[test]
    fn test_plan_skips_missing_ids() {
        let found = vec![
            ResourceState::new("a", "alice", false),
            ResourceState::new("b", "alice", false),
            ResourceState::new("c", "alice", false),
        ];
        let job = BulkJob::plan(
            new_job(BulkOperation::Activate, &["a", "b", "ghost", "c"]),
            &found,
        );

        assert_eq!(job.total_count, 4);
        assert_eq!(job.skipped_ids, ids(&["ghost"]));
        assert_eq!(job.target_ids.len(), 3);
    }

    #[test]
    fn test_plan_with_nothing_to_do_is_completed() {
        let found = vec![ResourceState::new("a", "alice", true)];
        let job = BulkJob::plan(new_job(BulkOperation::Activate, &["a", "missing"]), &found);

        assert!(job.target_ids.is_empty());
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress_percent, 100);
    }

    #[test]
    fn test_plan_collapses_duplicates() {
        let found = vec![ResourceState::new("a", "alice", true)];
        let job = BulkJob::plan(new_job(BulkOperation::Delete, &["a", "a", "a"]), &found);

        assert_eq!(job.total_count, 1);
        assert_eq!(job.target_ids, ids(&["a"]));
    }

    #[test]
    fn test_claim_is_all_or_nothing() {
        let found = vec![
            ResourceState::new("a", "alice", true),
            ResourceState::new("b", "alice", true),
            ResourceState::new("c", "alice", true),
        ];
        let mut job = BulkJob::plan(new_job(BulkOperation::Delete, &["a", "b", "c"]), &found);

        assert!(job.try_claim(&ids(&["a", "b"]), 2_000));
        // "b" is already claimed, so "c" must not be claimed either
        assert!(!job.try_claim(&ids(&["b", "c"]), 2_001));
        assert_eq!(job.claimed_ids, ids(&["a", "b"]));
        assert_eq!(job.next_batch(2), ids(&["c"]));
    }

    #[test]
    fn test_resolve_moves_only_claimed_ids() {
        let found = vec![
            ResourceState::new("a", "alice", true),
            ResourceState::new("b", "alice", true),
        ];
        let mut job = BulkJob::plan(new_job(BulkOperation::Delete, &["a", "b"]), &found);

        assert!(!job.resolve("a", &ItemOutcome::Processed, 2_000));
        assert!(job.try_claim(&ids(&["a", "b"]), 2_000));
        assert!(job.resolve("a", &ItemOutcome::Processed, 2_001));
        assert!(!job.resolve("a", &ItemOutcome::Processed, 2_002));
        assert_eq!(job.progress_percent, 50);

        assert!(job.resolve("b", &ItemOutcome::Failed("boom".into()), 2_003));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.failed_items[0].error, "boom");
        assert!(job.claimed_ids.is_empty());
    }

    #[test]
    fn test_stale_claim_detection() {
        let found = vec![ResourceState::new("a", "alice", true)];
        let mut job = BulkJob::plan(new_job(BulkOperation::Delete, &["a"]), &found);
        assert!(!job.has_stale_claims(1_000_000, 10_000));

        job.try_claim(&ids(&["a"]), 5_000);
        assert!(!job.has_stale_claims(15_000, 10_000));
        assert!(job.has_stale_claims(15_001, 10_000));

        assert!(job.release_claim("a", 15_001));
        assert_eq!(job.next_batch(2), ids(&["a"]));
    }

    #[test]
    fn test_operation_round_trip_through_str() {
        for op in [
            BulkOperation::Delete,
            BulkOperation::Activate,
            BulkOperation::Deactivate,
        ] {
            assert_eq!(op.as_str().parse::<BulkOperation>().unwrap(), op);
        }
        assert!("update_category".parse::<BulkOperation>().is_err());
    }
}
