// Job Planner Use Case

use super::constants::{MAX_BULK_ITEMS, MAX_ITEM_ID_LEN};
use crate::domain::{
    dedupe_ids, BulkJob, BulkOperation, Caller, ItemId, JobPayload, NewBulkJob,
};
use crate::error::{AppError, Result};
use crate::port::{BulkJobRepository, IdProvider, ResourceLookup, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Create-job request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub operation: BulkOperation,
    pub item_ids: Vec<ItemId>,

    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// Structural validation; anything rejected here never becomes a job
pub fn validate_request(req: &CreateJobRequest) -> Result<()> {
    if req.item_ids.is_empty() {
        return Err(AppError::Validation(
            "item_ids must be a non-empty array".to_string(),
        ));
    }

    if req.item_ids.len() > MAX_BULK_ITEMS {
        return Err(AppError::Validation(format!(
            "Too many item ids: {} (max {})",
            req.item_ids.len(),
            MAX_BULK_ITEMS
        )));
    }

    if let Some(bad) = req.item_ids.iter().find(|id| id.trim().is_empty()) {
        return Err(AppError::Validation(format!(
            "Item ids must be non-empty strings, got {:?}",
            bad
        )));
    }

    if let Some(bad) = req.item_ids.iter().find(|id| id.len() > MAX_ITEM_ID_LEN) {
        return Err(AppError::Validation(format!(
            "Item id too long: {} chars (max {})",
            bad.len(),
            MAX_ITEM_ID_LEN
        )));
    }

    match &req.payload {
        None | Some(serde_json::Value::Null) | Some(serde_json::Value::Object(_)) => Ok(()),
        Some(_) => Err(AppError::Validation(
            "payload must be a JSON object".to_string(),
        )),
    }
}

/// Plan and persist a bulk job.
///
/// One read of all requested items (scoped to `caller`), then pure
/// classification. No item is mutated here.
pub async fn execute(
    job_repo: &dyn BulkJobRepository,
    lookup: &dyn ResourceLookup,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    job_ttl_ms: i64,
    caller: &Caller,
    req: CreateJobRequest,
) -> Result<BulkJob> {
    validate_request(&req)?;

    let requested = dedupe_ids(&req.item_ids);
    if requested.len() < req.item_ids.len() {
        debug!(
            requested = req.item_ids.len(),
            distinct = requested.len(),
            "Collapsed duplicate item ids"
        );
    }

    let found = lookup.find_states(&requested, caller).await?;

    let created_at = time_provider.now_millis();
    let payload = match req.payload {
        Some(value) if !value.is_null() => JobPayload::new(value),
        _ => JobPayload::empty(),
    };

    let job = BulkJob::plan(
        NewBulkJob {
            id: id_provider.generate_id(),
            owner_id: caller.user_id.clone(),
            operation: req.operation,
            requested_ids: requested,
            payload,
            created_at,
            expires_at: created_at + job_ttl_ms,
        },
        &found,
    );

    job_repo.insert(&job).await?;

    info!(
        job_id = %job.id,
        owner = %job.owner_id,
        operation = %job.operation,
        total = job.total_count,
        targets = job.target_ids.len(),
        skipped = job.skipped_ids.len(),
        status = %job.status,
        "Bulk job planned"
    );

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(ids: Vec<&str>) -> CreateJobRequest {
        CreateJobRequest {
            operation: BulkOperation::Delete,
            item_ids: ids.into_iter().map(String::from).collect(),
            payload: None,
        }
    }

    #[test]
    fn test_validate_empty_ids() {
        let result = validate_request(&request(vec![]));
        assert!(result.unwrap_err().to_string().contains("non-empty"));
    }

    #[test]
    fn test_validate_blank_id() {
        let result = validate_request(&request(vec!["a", "  "]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_too_many_ids() {
        let ids: Vec<String> = (0..=MAX_BULK_ITEMS).map(|i| format!("item-{}", i)).collect();
        let req = CreateJobRequest {
            operation: BulkOperation::Activate,
            item_ids: ids,
            payload: None,
        };
        assert!(validate_request(&req)
            .unwrap_err()
            .to_string()
            .contains("Too many"));
    }

    #[test]
    fn test_validate_payload_must_be_object() {
        let mut req = request(vec!["a"]);
        req.payload = Some(json!([1, 2, 3]));
        assert!(validate_request(&req).is_err());

        req.payload = Some(json!({"reason": "cleanup"}));
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn test_request_wire_format() {
        let req: CreateJobRequest =
            serde_json::from_value(json!({"operation": "deactivate", "item_ids": ["x"]}))
                .unwrap();
        assert_eq!(req.operation, BulkOperation::Deactivate);
        assert!(req.payload.is_none());
    }
}
