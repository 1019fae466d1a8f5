//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    BulkJobView, CreateBulkJobRequest, CreateBulkJobResponse, JobRequest, MaintenanceRequest,
    MaintenanceResponse, StatsRequest, StatsResponse,
};
use bulkops_core::application::{BulkJobService, CreateJobRequest};
use bulkops_core::domain::{Caller, JobStatus};
use bulkops_core::error::AppError;
use bulkops_core::port::{BulkJobRepository, Maintenance, MaintenanceConfig};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Token bucket settings, applied per caller
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub burst: u32,
    pub rate_per_sec: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 200,
            rate_per_sec: 100,
        }
    }
}

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<BulkJobService>,
    job_repo: Arc<dyn BulkJobRepository>,
    maintenance: Arc<dyn Maintenance>,
    maintenance_config: MaintenanceConfig,
    rate_limiter: RateLimiter,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        service: Arc<BulkJobService>,
        job_repo: Arc<dyn BulkJobRepository>,
        maintenance: Arc<dyn Maintenance>,
        maintenance_config: MaintenanceConfig,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            service,
            job_repo,
            maintenance,
            maintenance_config,
            rate_limiter: RateLimiter::new(rate_limit.burst, rate_limit.rate_per_sec),
            start_time: Instant::now(),
        }
    }

    fn admit_caller(&self, caller: &Caller) -> Result<(), ErrorObjectOwned> {
        if self.rate_limiter.check(&caller.user_id) {
            Ok(())
        } else {
            debug!(caller = %caller.user_id, "Request throttled");
            Err(throttled(&caller.user_id))
        }
    }

    /// Admin methods: rate limited like everything else, then ADMIN only
    fn admit_admin(&self, caller: &Caller) -> Result<(), ErrorObjectOwned> {
        self.admit_caller(caller)?;
        if caller.is_privileged() {
            Ok(())
        } else {
            debug!(caller = %caller.user_id, role = %caller.role, "Admin method refused");
            Err(to_rpc_error(AppError::Forbidden(format!(
                "{} requires the ADMIN role",
                caller.user_id
            ))))
        }
    }

    /// bulk.create.v1
    pub async fn create_bulk_job(
        &self,
        params: CreateBulkJobRequest,
    ) -> Result<CreateBulkJobResponse, ErrorObjectOwned> {
        self.admit_caller(&params.caller)?;

        let req = CreateJobRequest {
            operation: params.operation,
            item_ids: params.item_ids,
            payload: params.payload,
        };

        let job = self
            .service
            .create_job(&params.caller, req)
            .await
            .map_err(to_rpc_error)?;

        Ok(CreateBulkJobResponse {
            job_id: job.id,
            status: job.status,
            progress: job.progress_percent,
            total_items: job.total_count,
        })
    }

    /// bulk.poll.v1 - advances the job by at most one batch
    pub async fn poll_bulk_job(&self, params: JobRequest) -> Result<BulkJobView, ErrorObjectOwned> {
        self.admit_caller(&params.caller)?;

        let job = self
            .service
            .process_next_batch(&params.job_id, &params.caller)
            .await
            .map_err(to_rpc_error)?;

        Ok(BulkJobView::from(&job))
    }

    /// bulk.get.v1 - read-only
    pub async fn get_bulk_job(&self, params: JobRequest) -> Result<BulkJobView, ErrorObjectOwned> {
        self.admit_caller(&params.caller)?;

        let job = self
            .service
            .get_job(&params.job_id, &params.caller)
            .await
            .map_err(to_rpc_error)?;

        Ok(BulkJobView::from(&job))
    }

    /// admin.stats.v1
    pub async fn stats(&self, params: StatsRequest) -> Result<StatsResponse, ErrorObjectOwned> {
        self.admit_admin(&params.caller)?;

        let pending = self
            .job_repo
            .count_by_status(JobStatus::Pending)
            .await
            .map_err(to_rpc_error)?;

        let processing = self
            .job_repo
            .count_by_status(JobStatus::Processing)
            .await
            .map_err(to_rpc_error)?;

        let completed = self
            .job_repo
            .count_by_status(JobStatus::Completed)
            .await
            .map_err(to_rpc_error)?;

        let stats = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        Ok(StatsResponse {
            total_jobs: stats.job_count,
            pending_jobs: pending,
            processing_jobs: processing,
            completed_jobs: completed,
            expired_jobs: stats.expired_job_count,
            item_count: stats.item_count,
            db_size_bytes: stats.db_size_bytes,
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }

    /// admin.maintenance.v1
    pub async fn maintenance(
        &self,
        params: MaintenanceRequest,
    ) -> Result<MaintenanceResponse, ErrorObjectOwned> {
        self.admit_admin(&params.caller)?;

        let stats_before = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        let jobs_purged = self
            .maintenance
            .purge_expired_jobs()
            .await
            .map_err(to_rpc_error)?;

        let vacuum_run =
            if params.force_vacuum || stats_before.db_size_mb > self.maintenance_config.max_db_size_mb {
                self.maintenance.vacuum().await.map_err(to_rpc_error)?;
                true
            } else {
                false
            };

        let stats_after = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        Ok(MaintenanceResponse {
            vacuum_run,
            jobs_purged,
            db_size_before: stats_before.db_size_bytes,
            db_size_after: stats_after.db_size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use async_trait::async_trait;
    use bulkops_core::application::BulkEngineConfig;
    use bulkops_core::domain::{BulkOperation, ResourceState, Role};
    use bulkops_core::error::Result as AppResult;
    use bulkops_core::port::bulk_job_repository::mocks::InMemoryBulkJobRepository;
    use bulkops_core::port::id_provider::SequentialIdProvider;
    use bulkops_core::port::resource::mocks::InMemoryItemStore;
    use bulkops_core::port::time_provider::ManualTimeProvider;
    use bulkops_core::port::MaintenanceStats;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeMaintenance {
        vacuums: AtomicUsize,
    }

    #[async_trait]
    impl Maintenance for FakeMaintenance {
        async fn vacuum(&self) -> AppResult<f64> {
            self.vacuums.fetch_add(1, Ordering::SeqCst);
            Ok(0.0)
        }

        async fn purge_expired_jobs(&self) -> AppResult<i64> {
            Ok(2)
        }

        async fn get_stats(&self) -> AppResult<MaintenanceStats> {
            Ok(MaintenanceStats {
                db_size_mb: 1.0,
                db_size_bytes: 1_048_576,
                job_count: 3,
                completed_job_count: 1,
                expired_job_count: 0,
                item_count: 4,
            })
        }
    }

    fn handler_with(rate_limit: RateLimitConfig) -> (RpcHandler, Arc<FakeMaintenance>) {
        let repo = Arc::new(InMemoryBulkJobRepository::new());
        let items = Arc::new(InMemoryItemStore::with_items(vec![
            ResourceState::new("a", "u1", true),
            ResourceState::new("b", "u1", false),
            ResourceState::new("c", "u1", true),
        ]));
        let service = Arc::new(BulkJobService::new(
            repo.clone(),
            items.clone(),
            items,
            Arc::new(SequentialIdProvider::new("job")),
            Arc::new(ManualTimeProvider::new(1_000)),
            BulkEngineConfig::default(),
        ));
        let maintenance = Arc::new(FakeMaintenance::default());

        (
            RpcHandler::new(
                service,
                repo,
                maintenance.clone(),
                MaintenanceConfig::default(),
                rate_limit,
            ),
            maintenance,
        )
    }

    fn caller(user: &str) -> Caller {
        Caller::new(user, Role::Editor)
    }

    fn create_params(ids: &[&str]) -> CreateBulkJobRequest {
        CreateBulkJobRequest {
            caller: caller("u1"),
            operation: BulkOperation::Deactivate,
            item_ids: ids.iter().map(|s| s.to_string()).collect(),
            payload: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_poll_to_completion() {
        let (handler, _) = handler_with(RateLimitConfig::default());

        let created = handler
            .create_bulk_job(create_params(&["a", "b", "c", "ghost"]))
            .await
            .unwrap();
        assert_eq!(created.total_items, 4);
        assert_eq!(created.progress, 50);

        let view = handler
            .poll_bulk_job(JobRequest {
                caller: caller("u1"),
                job_id: created.job_id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.progress, 100);
        assert_eq!(view.summary.total, 4);
        assert_eq!(view.summary.success, 2);
        assert_eq!(view.summary.skipped, 2);
        assert_eq!(view.summary.failed, 0);
        assert_eq!(view.skipped_ids, vec!["b".to_string(), "ghost".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_and_foreign_jobs_are_not_found() {
        let (handler, _) = handler_with(RateLimitConfig::default());
        let created = handler.create_bulk_job(create_params(&["a"])).await.unwrap();

        let err = handler
            .get_bulk_job(JobRequest {
                caller: caller("u2"),
                job_id: created.job_id,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);

        let err = handler
            .poll_bulk_job(JobRequest {
                caller: caller("u1"),
                job_id: "nope".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_error_code() {
        let (handler, _) = handler_with(RateLimitConfig::default());
        let err = handler.create_bulk_job(create_params(&[])).await.unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_throttling_is_per_caller() {
        let (handler, _) = handler_with(RateLimitConfig {
            burst: 1,
            rate_per_sec: 1,
        });

        let created = handler.create_bulk_job(create_params(&["a"])).await.unwrap();
        let err = handler
            .get_bulk_job(JobRequest {
                caller: caller("u1"),
                job_id: created.job_id.clone(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::THROTTLED);

        // Someone else still gets through (and sees NOT_FOUND, not THROTTLED)
        let err = handler
            .get_bulk_job(JobRequest {
                caller: caller("u2"),
                job_id: created.job_id,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);
    }

    fn admin() -> Caller {
        Caller::new("root", Role::Admin)
    }

    #[tokio::test]
    async fn test_stats_and_maintenance() {
        let (handler, maintenance) = handler_with(RateLimitConfig::default());
        handler.create_bulk_job(create_params(&["a"])).await.unwrap();

        let stats = handler.stats(StatsRequest { caller: admin() }).await.unwrap();
        assert_eq!(stats.pending_jobs, 1);
        assert_eq!(stats.item_count, 4);

        let result = handler
            .maintenance(MaintenanceRequest {
                caller: admin(),
                force_vacuum: false,
            })
            .await
            .unwrap();
        assert_eq!(result.jobs_purged, 2);
        assert!(!result.vacuum_run);

        let result = handler
            .maintenance(MaintenanceRequest {
                caller: admin(),
                force_vacuum: true,
            })
            .await
            .unwrap();
        assert!(result.vacuum_run);
        assert_eq!(maintenance.vacuums.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_admin_methods_require_admin_role() {
        let (handler, maintenance) = handler_with(RateLimitConfig::default());

        let err = handler
            .stats(StatsRequest { caller: caller("u1") })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::FORBIDDEN);

        let err = handler
            .maintenance(MaintenanceRequest {
                caller: caller("u1"),
                force_vacuum: true,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::FORBIDDEN);
        assert_eq!(maintenance.vacuums.load(Ordering::SeqCst), 0);
    }
}
