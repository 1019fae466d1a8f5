//! Daemon configuration from environment variables

use anyhow::{Context, Result};
use bulkops_api_rpc::{RateLimitConfig, RpcServerConfig};
use bulkops_core::application::bulk::constants::JOB_TTL_MS;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.bulkops/bulkops.db";
const DEFAULT_MAINTENANCE_INTERVAL_MINUTES: u64 = 60;
const HOUR_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub rpc: RpcServerConfig,
    pub log_format: LogFormat,
    /// Daily-rotating JSON log files are written here when set
    pub log_dir: Option<PathBuf>,
    pub job_ttl_ms: i64,
    pub maintenance_interval: Duration,
    pub rate_limit: RateLimitConfig,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let rpc_defaults = RpcServerConfig::default();
        let rate_defaults = RateLimitConfig::default();

        let db_path = lookup("BULKOPS_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let log_format = match lookup("BULKOPS_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let ttl_hours: Option<i64> = parse_var(&lookup, "BULKOPS_JOB_TTL_HOURS")?;
        let job_ttl_ms = match ttl_hours {
            Some(hours) if hours > 0 => hours * HOUR_MS,
            Some(hours) => anyhow::bail!("BULKOPS_JOB_TTL_HOURS must be positive, got {}", hours),
            None => JOB_TTL_MS,
        };

        let interval_minutes = parse_var(&lookup, "BULKOPS_MAINTENANCE_INTERVAL_MINUTES")?
            .unwrap_or(DEFAULT_MAINTENANCE_INTERVAL_MINUTES)
            .max(1);

        Ok(Self {
            db_path: expand(&db_path),
            rpc: RpcServerConfig {
                host: lookup("BULKOPS_RPC_HOST").unwrap_or(rpc_defaults.host),
                port: parse_var(&lookup, "BULKOPS_RPC_PORT")?.unwrap_or(rpc_defaults.port),
            },
            log_format,
            log_dir: lookup("BULKOPS_LOG_DIR").map(|dir| expand(&dir)),
            job_ttl_ms,
            maintenance_interval: Duration::from_secs(interval_minutes * 60),
            rate_limit: RateLimitConfig {
                burst: parse_var(&lookup, "BULKOPS_RATE_LIMIT_BURST")?
                    .unwrap_or(rate_defaults.burst),
                rate_per_sec: parse_var(&lookup, "BULKOPS_RATE_LIMIT_RATE")?
                    .unwrap_or(rate_defaults.rate_per_sec),
            },
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
