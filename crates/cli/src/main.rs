//! Bulkops CLI - start, poll and inspect bulk jobs over JSON-RPC

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9630";

#[derive(Parser)]
#[command(name = "bulkops")]
#[command(about = "Bulkops CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "BULKOPS_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Caller user id sent with bulk requests
    #[arg(long, env = "BULKOPS_USER", default_value = "cli")]
    user: String,

    /// Caller role sent with bulk requests
    #[arg(long, env = "BULKOPS_ROLE", value_enum, default_value_t = RoleArg::Editor)]
    role: RoleArg,
}

#[derive(Copy, Clone, ValueEnum)]
enum RoleArg {
    Admin,
    Editor,
    Viewer,
}

impl RoleArg {
    fn wire_name(self) -> &'static str {
        match self {
            RoleArg::Admin => "ADMIN",
            RoleArg::Editor => "EDITOR",
            RoleArg::Viewer => "VIEWER",
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum OperationArg {
    Delete,
    Activate,
    Deactivate,
}

impl OperationArg {
    fn wire_name(self) -> &'static str {
        match self {
            OperationArg::Delete => "delete",
            OperationArg::Activate => "activate",
            OperationArg::Deactivate => "deactivate",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a new bulk job
    Start {
        /// Operation to apply to every item
        #[arg(short, long, value_enum)]
        operation: OperationArg,

        /// Item ids (duplicates are collapsed by the server)
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,

        /// Optional payload as JSON string
        #[arg(long)]
        payload: Option<String>,
    },

    /// Advance a job by one batch
    Poll {
        /// Job ID
        job_id: String,
    },

    /// Show a job without advancing it
    Get {
        /// Job ID
        job_id: String,
    },

    /// Poll a job until it completes
    Watch {
        /// Job ID
        job_id: String,

        /// Seconds between polls
        #[arg(short, long, default_value = "2")]
        interval: u64,
    },

    /// Show system status (requires --role admin)
    Status,

    /// Run maintenance operations (requires --role admin)
    Maintenance {
        /// Force VACUUM even if not needed
        #[arg(long)]
        force_vacuum: bool,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct CreateResult {
    job_id: String,
    status: String,
    progress: u8,
    total_items: usize,
}

#[derive(Deserialize)]
struct Summary {
    total: usize,
    success: usize,
    failed: usize,
    skipped: usize,
}

#[derive(Deserialize)]
struct Failure {
    id: String,
    error: String,
}

#[derive(Deserialize)]
struct JobView {
    job_id: String,
    operation: String,
    status: String,
    progress: u8,
    summary: Summary,
    failures: Vec<Failure>,
}

#[derive(Tabled)]
struct JobRow {
    job_id: String,
    operation: String,
    status: String,
    progress: String,
    total: usize,
    success: usize,
    failed: usize,
    skipped: usize,
}

#[derive(Tabled)]
struct FailureRow {
    item_id: String,
    error: String,
}

impl JobView {
    fn is_complete(&self) -> bool {
        self.status == "completed"
    }

    fn print(&self) {
        let row = JobRow {
            job_id: self.job_id.clone(),
            operation: self.operation.clone(),
            status: self.status.clone(),
            progress: format!("{}%", self.progress),
            total: self.summary.total,
            success: self.summary.success,
            failed: self.summary.failed,
            skipped: self.summary.skipped,
        };
        println!("{}", Table::new(vec![row]));

        if !self.failures.is_empty() {
            println!();
            println!("{}", "Failures:".red().bold());
            let rows: Vec<FailureRow> = self
                .failures
                .iter()
                .map(|f| FailureRow {
                    item_id: f.id.clone(),
                    error: f.error.clone(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

async fn call_job(cli: &Cli, method: &str, job_id: &str) -> Result<JobView> {
    let params = json!({
        "caller": caller_json(cli),
        "job_id": job_id,
    });
    let result = call_rpc(&cli.rpc_url, method, params).await?;
    serde_json::from_value(result).context("Unexpected job payload")
}

fn caller_json(cli: &Cli) -> serde_json::Value {
    json!({
        "user_id": cli.user,
        "role": cli.role.wire_name(),
    })
}

fn megabytes(value: &serde_json::Value) -> f64 {
    value.as_i64().unwrap_or(0) as f64 / (1024.0 * 1024.0)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Start {
            operation,
            ids,
            payload,
        } => {
            let payload_json: Option<serde_json::Value> = payload
                .as_deref()
                .map(serde_json::from_str::<serde_json::Value>)
                .transpose()
                .context("Invalid JSON payload")?;

            let params = json!({
                "caller": caller_json(&cli),
                "operation": operation.wire_name(),
                "item_ids": ids,
                "payload": payload_json,
            });

            let result = call_rpc(&cli.rpc_url, "bulk.create.v1", params).await?;
            let created: CreateResult = serde_json::from_value(result)?;

            println!("{}", "✓ Bulk job planned".green().bold());
            println!();
            println!("{}", Table::new(vec![created]));
        }

        Commands::Poll { job_id } => {
            let view = call_job(&cli, "bulk.poll.v1", job_id).await?;
            view.print();
        }

        Commands::Get { job_id } => {
            let view = call_job(&cli, "bulk.get.v1", job_id).await?;
            view.print();
        }

        Commands::Watch { job_id, interval } => {
            let pause = Duration::from_secs((*interval).max(1));
            loop {
                let view = call_job(&cli, "bulk.poll.v1", job_id).await?;
                println!(
                    "  {} {:>3}%  ({} ok, {} skipped, {} failed)",
                    view.status.cyan(),
                    view.progress,
                    view.summary.success,
                    view.summary.skipped,
                    view.summary.failed
                );

                if view.is_complete() {
                    println!();
                    println!("{}", "✓ Job completed".green().bold());
                    view.print();
                    break;
                }
                tokio::time::sleep(pause).await;
            }
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({ "caller": caller_json(&cli) })).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats["total_jobs"]);
                    println!("  {} {}", "Pending:".bold(), stats["pending_jobs"]);
                    println!("  {} {}", "Processing:".bold(), stats["processing_jobs"]);
                    println!("  {} {}", "Completed:".bold(), stats["completed_jobs"]);
                    println!("  {} {}", "Expired:".bold(), stats["expired_jobs"]);
                    println!("  {} {}", "Items:".bold(), stats["item_count"]);
                    println!();
                    println!("  {} {:.2} MB", "DB Size:".bold(), megabytes(&stats["db_size_bytes"]));
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Maintenance { force_vacuum } => {
            println!("{}", "Running maintenance...".cyan().bold());
            println!();

            let params = json!({
                "caller": caller_json(&cli),
                "force_vacuum": force_vacuum,
            });

            match call_rpc(&cli.rpc_url, "admin.maintenance.v1", params).await {
                Ok(result) => {
                    println!("  ✓ Maintenance completed");
                    println!();
                    if result["vacuum_run"].as_bool().unwrap_or(false) {
                        println!("  {} VACUUM executed", "✓".green());
                    } else {
                        println!("  ○ VACUUM skipped (not needed)");
                    }
                    println!("  {} {} expired jobs purged", "✓".green(), result["jobs_purged"]);
                    println!();
                    println!(
                        "  {} {:.2} MB → {:.2} MB",
                        "DB Size:".bold(),
                        megabytes(&result["db_size_before"]),
                        megabytes(&result["db_size_after"])
                    );
                }
                Err(e) => {
                    println!("  {} Maintenance failed: {}", "✗".red(), e);
                }
            }
        }
    }

    Ok(())
}
