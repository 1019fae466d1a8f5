//! Bulkops Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{
    Caller, CreateJobRequest, CreateJobResponse, JobRequest, JobView, MaintenanceRequest,
    MaintenanceResponse, StatsRequest, StatsResponse,
};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::traits::ToRpcParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::Serialize;
use serde_json::value::RawValue;
use std::time::Duration;
use tracing::debug;

/// Params sent as a single JSON object, the shape every daemon method parses
struct ObjectParams(Box<RawValue>);

impl ObjectParams {
    fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self(serde_json::value::to_raw_value(value)?))
    }
}

impl ToRpcParams for ObjectParams {
    fn to_rpc_params(self) -> std::result::Result<Option<Box<RawValue>>, serde_json::Error> {
        Ok(Some(self.0))
    }
}

/// Bulkops daemon client
///
/// # Example
///
/// ```no_run
/// use bulkops_sdk::BulkopsClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = BulkopsClient::connect("http://127.0.0.1:9630").await?;
/// # Ok(())
/// # }
/// ```
pub struct BulkopsClient {
    client: HttpClient,
}

impl BulkopsClient {
    /// Connect to the daemon at `url` (e.g. `http://127.0.0.1:9630`)
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();

        let client = HttpClientBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .build(url)
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self { client })
    }

    /// Plan a bulk job. No item is mutated until the job is polled.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use bulkops_sdk::{BulkopsClient, BulkOperation, Caller, CreateJobRequest, Role};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client = BulkopsClient::connect("http://127.0.0.1:9630").await?;
    /// let created = client.create_job(CreateJobRequest {
    ///     caller: Caller::new("u1", Role::Editor),
    ///     operation: BulkOperation::Deactivate,
    ///     item_ids: vec!["a".into(), "b".into()],
    ///     payload: None,
    /// }).await?;
    ///
    /// println!("Job ID: {}", created.job_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_job(&self, request: CreateJobRequest) -> Result<CreateJobResponse> {
        let params = ObjectParams::from_value(&request)?;
        let response: CreateJobResponse = self.client.request("bulk.create.v1", params).await?;

        Ok(response)
    }

    /// Advance the job by at most one batch
    pub async fn poll(&self, caller: &Caller, job_id: &str) -> Result<JobView> {
        let params = ObjectParams::from_value(&JobRequest { caller, job_id })?;
        let response: JobView = self.client.request("bulk.poll.v1", params).await?;

        Ok(response)
    }

    /// Read the job without advancing it
    pub async fn get(&self, caller: &Caller, job_id: &str) -> Result<JobView> {
        let params = ObjectParams::from_value(&JobRequest { caller, job_id })?;
        let response: JobView = self.client.request("bulk.get.v1", params).await?;

        Ok(response)
    }

    /// Poll every `interval` until the job completes.
    ///
    /// Gives up with [`SdkError::PollLimit`] after `max_polls` polls.
    pub async fn watch_until_complete(
        &self,
        caller: &Caller,
        job_id: &str,
        interval: Duration,
        max_polls: usize,
    ) -> Result<JobView> {
        for attempt in 1..=max_polls {
            let view = self.poll(caller, job_id).await?;
            debug!(job_id = %job_id, attempt, progress = view.progress, "Polled bulk job");

            if view.is_complete() {
                return Ok(view);
            }
            tokio::time::sleep(interval).await;
        }

        Err(SdkError::PollLimit {
            job_id: job_id.to_string(),
            polls: max_polls,
        })
    }

    /// Store statistics (ADMIN callers only)
    pub async fn stats(&self, caller: &Caller) -> Result<StatsResponse> {
        let params = ObjectParams::from_value(&StatsRequest { caller })?;
        let response: StatsResponse = self.client.request("admin.stats.v1", params).await?;

        Ok(response)
    }

    /// Purge expired jobs, optionally forcing VACUUM (ADMIN callers only)
    pub async fn maintenance(
        &self,
        caller: &Caller,
        force_vacuum: bool,
    ) -> Result<MaintenanceResponse> {
        let params = ObjectParams::from_value(&MaintenanceRequest {
            caller,
            force_vacuum,
        })?;
        let response: MaintenanceResponse =
            self.client.request("admin.maintenance.v1", params).await?;

        Ok(response)
    }
}
