//! Bulkops daemon: JSON-RPC server + scheduled maintenance

mod config;
mod logging;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use bulkops_api_rpc::{RpcHandler, RpcServer};
use bulkops_core::application::{
    shutdown_channel, BulkEngineConfig, BulkJobService, MaintenanceScheduler,
};
use bulkops_core::port::id_provider::UuidProvider;
use bulkops_core::port::time_provider::SystemTimeProvider;
use bulkops_core::port::MaintenanceConfig;
use bulkops_infra_sqlite::{
    create_pool, run_migrations, SqliteBulkJobRepository, SqliteItemStore, SqliteMaintenance,
};

use config::DaemonConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SCHEDULER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration, then logging (the file layer depends on config)
    let config = DaemonConfig::from_env()?;
    let _log_guard = logging::init_logging(&config)?;

    info!("Bulkops daemon v{} starting...", VERSION);

    // 2. Database
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db_path = config.db_path.to_string_lossy().into_owned();
    info!(db_path = %db_path, "Initializing database...");

    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 3. DI wiring
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let job_repo = Arc::new(SqliteBulkJobRepository::new(pool.clone()));
    let item_store = Arc::new(SqliteItemStore::new(pool.clone(), time_provider.clone()));
    let maintenance = Arc::new(SqliteMaintenance::new(pool.clone(), time_provider.clone()));

    let engine_config = BulkEngineConfig {
        job_ttl_ms: config.job_ttl_ms,
        ..Default::default()
    };
    let service = Arc::new(BulkJobService::new(
        job_repo.clone(),
        item_store.clone(),
        item_store,
        id_provider,
        time_provider,
        engine_config,
    ));

    // 4. JSON-RPC server
    let maintenance_config = MaintenanceConfig::default();
    let handler = RpcHandler::new(
        service,
        job_repo,
        maintenance.clone(),
        maintenance_config.clone(),
        config.rate_limit,
    );
    let (addr, rpc_handle) = RpcServer::new(config.rpc.clone(), handler)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 5. Maintenance scheduler
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let scheduler = MaintenanceScheduler::new(
        maintenance,
        maintenance_config,
        config.maintenance_interval,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    info!(
        addr = %addr,
        job_ttl_ms = config.job_ttl_ms,
        "System ready. Press Ctrl+C to shutdown"
    );

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }
    rpc_handle.stopped().await;

    match tokio::time::timeout(SCHEDULER_STOP_TIMEOUT, scheduler_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = ?e, "Maintenance scheduler panicked"),
        Err(_) => warn!("Maintenance scheduler did not stop in time"),
    }

    pool.close().await;
    info!("Shutdown complete.");

    Ok(())
}
