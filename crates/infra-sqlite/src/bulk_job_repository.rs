// SQLite BulkJobRepository Implementation
//
// A job is one `bulk_jobs` row plus one `bulk_job_items` row per distinct
// requested id. The item row's `bucket` column is the single source of truth
// for which bucket an id sits in; every transition is a conditional UPDATE on
// that column.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use bulkops_core::domain::{
    derive_progress, BulkJob, BulkJobId, Caller, FailedItem, ItemId, ItemOutcome, JobPayload,
    JobStatus,
};
use bulkops_core::error::{AppError, Result};
use bulkops_core::port::BulkJobRepository;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const PLANNED_TARGET: &str = "TARGET";
const PLANNED_SKIP: &str = "SKIP";

const BUCKET_PENDING: &str = "PENDING";
const BUCKET_CLAIMED: &str = "CLAIMED";
const BUCKET_PROCESSED: &str = "PROCESSED";
const BUCKET_SKIPPED: &str = "SKIPPED";
const BUCKET_FAILED: &str = "FAILED";

/// Rows per multi-row INSERT (keeps bind count far below SQLite's limit)
const INSERT_CHUNK: usize = 200;

pub struct SqliteBulkJobRepository {
    pool: SqlitePool,
}

impl SqliteBulkJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BulkJobRepository for SqliteBulkJobRepository {
    async fn insert(&self, job: &BulkJob) -> Result<()> {
        let ledger = ledger_rows(job);

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO bulk_jobs (
                id, owner_id, operation, payload, status,
                total_count, progress_percent,
                created_at, last_updated_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.owner_id)
        .bind(job.operation.as_str())
        .bind(job.payload.as_value().to_string())
        .bind(job.status.as_str())
        .bind(job.total_count as i64)
        .bind(job.progress_percent as i64)
        .bind(job.created_at)
        .bind(job.last_updated_at)
        .bind(job.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        for chunk in ledger.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "INSERT INTO bulk_job_items \
                 (job_id, item_id, position, planned, bucket, error_message, resolved_seq) ",
            );
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(job.id.as_str())
                    .push_bind(row.item_id)
                    .push_bind(row.position)
                    .push_bind(row.planned)
                    .push_bind(row.bucket)
                    .push_bind(row.error_message)
                    .push_bind(row.resolved_seq);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_visible(&self, id: &BulkJobId, caller: &Caller) -> Result<Option<BulkJob>> {
        // Both reads share one snapshot
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, BulkJobRow>(
            "SELECT * FROM bulk_jobs WHERE id = ? AND (? OR owner_id = ?)",
        )
        .bind(id)
        .bind(caller.is_privileged())
        .bind(&caller.user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            tx.commit().await.map_err(map_sqlx_error)?;
            return Ok(None);
        };

        let items = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT item_id, position, planned, bucket, error_message, resolved_seq
            FROM bulk_job_items
            WHERE job_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        row.into_job(items).map(Some)
    }

    async fn try_claim(
        &self,
        id: &BulkJobId,
        item_ids: &[ItemId],
        now_millis: i64,
    ) -> Result<bool> {
        let distinct: HashSet<&str> = item_ids.iter().map(String::as_str).collect();
        if distinct.is_empty() {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE bulk_job_items SET bucket = ");
        builder
            .push_bind(BUCKET_CLAIMED)
            .push(" WHERE job_id = ")
            .push_bind(id.as_str())
            .push(" AND bucket = ")
            .push_bind(BUCKET_PENDING)
            .push(" AND planned = ")
            .push_bind(PLANNED_TARGET)
            .push(" AND item_id IN (");
        let mut separated = builder.separated(", ");
        for item_id in &distinct {
            separated.push_bind(*item_id);
        }
        separated.push_unseparated(")");

        let result = builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() != distinct.len() as u64 {
            // Some id was taken in the meantime: all or nothing
            tx.rollback().await.map_err(map_sqlx_error)?;
            debug!(
                job_id = %id,
                wanted = distinct.len(),
                available = result.rows_affected(),
                "Claim rejected"
            );
            return Ok(false);
        }

        sqlx::query("UPDATE bulk_jobs SET last_updated_at = ? WHERE id = ?")
            .bind(now_millis)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }

    async fn resolve(
        &self,
        id: &BulkJobId,
        item_id: &ItemId,
        outcome: &ItemOutcome,
        now_millis: i64,
    ) -> Result<bool> {
        let (bucket, error_message) = match outcome {
            ItemOutcome::Processed => (BUCKET_PROCESSED, None),
            ItemOutcome::Skipped => (BUCKET_SKIPPED, None),
            ItemOutcome::Failed(error) => (BUCKET_FAILED, Some(error.as_str())),
        };

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            UPDATE bulk_job_items
            SET bucket = ?,
                error_message = ?,
                resolved_seq = (
                    SELECT COALESCE(MAX(resolved_seq), 0) + 1
                    FROM bulk_job_items
                    WHERE job_id = ?
                )
            WHERE job_id = ? AND item_id = ? AND bucket = ?
            "#,
        )
        .bind(bucket)
        .bind(error_message)
        .bind(id)
        .bind(id)
        .bind(item_id)
        .bind(BUCKET_CLAIMED)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(false);
        }

        let (done, total): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM bulk_job_items
                 WHERE job_id = ? AND bucket IN (?, ?, ?)),
                total_count
            FROM bulk_jobs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .bind(BUCKET_PROCESSED)
        .bind(BUCKET_SKIPPED)
        .bind(BUCKET_FAILED)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let (status, percent) = derive_progress(done as usize, total as usize);

        sqlx::query(
            r#"
            UPDATE bulk_jobs
            SET status = ?, progress_percent = ?, last_updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(percent as i64)
        .bind(now_millis)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }

    async fn release_stale_claim(
        &self,
        id: &BulkJobId,
        item_id: &ItemId,
        stale_before: i64,
        now_millis: i64,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Touching the job first serializes concurrent reclaimers on the staleness check
        let touched = sqlx::query(
            r#"
            UPDATE bulk_jobs
            SET last_updated_at = ?
            WHERE id = ? AND last_updated_at < ? AND status != ?
            "#,
        )
        .bind(now_millis)
        .bind(id)
        .bind(stale_before)
        .bind(JobStatus::Completed.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if touched.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(false);
        }

        let released = sqlx::query(
            "UPDATE bulk_job_items SET bucket = ? WHERE job_id = ? AND item_id = ? AND bucket = ?",
        )
        .bind(BUCKET_PENDING)
        .bind(id)
        .bind(item_id)
        .bind(BUCKET_CLAIMED)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if released.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(false);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }

    async fn finalize(&self, id: &BulkJobId, now_millis: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bulk_jobs
            SET status = ?, progress_percent = 100, last_updated_at = ?
            WHERE id = ? AND status != ?
            "#,
        )
        .bind(JobStatus::Completed.as_str())
        .bind(now_millis)
        .bind(id)
        .bind(JobStatus::Completed.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bulk_jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

/// One `bulk_job_items` row to insert
struct NewLedgerRow<'a> {
    item_id: &'a str,
    position: i64,
    planned: &'static str,
    bucket: &'static str,
    error_message: Option<&'a str>,
    resolved_seq: Option<i64>,
}

/// Flatten a job's buckets into ledger rows.
///
/// Targets come first in target order, then ids skipped at plan time.
/// Resolved ids get increasing `resolved_seq` so bucket order survives a reload.
fn ledger_rows(job: &BulkJob) -> Vec<NewLedgerRow<'_>> {
    let resolved: Vec<(&str, &'static str, Option<&str>)> = job
        .processed_ids
        .iter()
        .map(|id| (id.as_str(), BUCKET_PROCESSED, None::<&str>))
        .chain(
            job.skipped_ids
                .iter()
                .map(|id| (id.as_str(), BUCKET_SKIPPED, None)),
        )
        .chain(
            job.failed_items
                .iter()
                .map(|f| (f.id.as_str(), BUCKET_FAILED, Some(f.error.as_str()))),
        )
        .collect();

    let resolved_by_id: HashMap<&str, (i64, &'static str, Option<&str>)> = resolved
        .iter()
        .enumerate()
        .map(|(i, &(id, bucket, error))| (id, (i as i64 + 1, bucket, error)))
        .collect();
    let claimed: HashSet<&str> = job.claimed_ids.iter().map(String::as_str).collect();
    let targets: HashSet<&str> = job.target_ids.iter().map(String::as_str).collect();

    let mut rows = Vec::with_capacity(job.total_count);
    for id in &job.target_ids {
        let (bucket, error_message, resolved_seq) = match resolved_by_id.get(id.as_str()) {
            Some(&(seq, bucket, error)) => (bucket, error, Some(seq)),
            None if claimed.contains(id.as_str()) => (BUCKET_CLAIMED, None, None),
            None => (BUCKET_PENDING, None, None),
        };
        rows.push(NewLedgerRow {
            item_id: id.as_str(),
            position: rows.len() as i64,
            planned: PLANNED_TARGET,
            bucket,
            error_message,
            resolved_seq,
        });
    }

    for (i, &(id, bucket, error_message)) in resolved.iter().enumerate() {
        if targets.contains(id) {
            continue;
        }
        rows.push(NewLedgerRow {
            item_id: id,
            position: rows.len() as i64,
            planned: PLANNED_SKIP,
            bucket,
            error_message,
            resolved_seq: Some(i as i64 + 1),
        });
    }

    rows
}

#[derive(Debug, sqlx::FromRow)]
struct BulkJobRow {
    id: String,
    owner_id: String,
    operation: String,
    payload: String,
    status: String,
    total_count: i64,
    progress_percent: i64,
    created_at: i64,
    last_updated_at: i64,
    expires_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    item_id: String,
    position: i64,
    planned: String,
    bucket: String,
    error_message: Option<String>,
    resolved_seq: Option<i64>,
}

impl BulkJobRow {
    /// Rebuild the entity. `items` must be ordered by position.
    fn into_job(self, items: Vec<LedgerRow>) -> Result<BulkJob> {
        let target_ids: Vec<ItemId> = items
            .iter()
            .filter(|r| r.planned == PLANNED_TARGET)
            .map(|r| r.item_id.clone())
            .collect();

        let claimed_ids: Vec<ItemId> = items
            .iter()
            .filter(|r| r.bucket == BUCKET_CLAIMED)
            .map(|r| r.item_id.clone())
            .collect();

        let mut resolved: Vec<&LedgerRow> =
            items.iter().filter(|r| r.resolved_seq.is_some()).collect();
        resolved.sort_by_key(|r| (r.resolved_seq, r.position));

        let mut processed_ids = Vec::new();
        let mut skipped_ids = Vec::new();
        let mut failed_items = Vec::new();
        for row in resolved {
            match row.bucket.as_str() {
                BUCKET_PROCESSED => processed_ids.push(row.item_id.clone()),
                BUCKET_SKIPPED => skipped_ids.push(row.item_id.clone()),
                BUCKET_FAILED => failed_items.push(FailedItem {
                    id: row.item_id.clone(),
                    error: row.error_message.clone().unwrap_or_default(),
                }),
                other => {
                    return Err(AppError::Database(format!(
                        "Resolved item {} in unexpected bucket {}",
                        row.item_id, other
                    )))
                }
            }
        }

        Ok(BulkJob {
            id: self.id,
            owner_id: self.owner_id,
            operation: self.operation.parse()?,
            target_ids,
            claimed_ids,
            processed_ids,
            skipped_ids,
            failed_items,
            payload: JobPayload::new(serde_json::from_str(&self.payload)?),
            status: self.status.parse()?,
            total_count: self.total_count as usize,
            progress_percent: self.progress_percent.clamp(0, 100) as u8,
            created_at: self.created_at,
            last_updated_at: self.last_updated_at,
            expires_at: self.expires_at,
        })
    }
}
