//! Semantica CLI - Command-line interface for Semantica Task Engine

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use semantica_core::domain::{Job, JobDefinition};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9527";

#[derive(Parser)]
#[command(name = "semantica")]
#[command(about = "Semantica Task Engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "SEMANTICA_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job definition, read from a JSON file
    Submit {
        /// Path to a JSON file containing the JobDefinition
        path: String,
    },

    /// Fetch a single job by id
    Get {
        /// Job ID
        job_id: String,
    },

    /// List jobs, optionally filtered
    List {
        /// Filter by status (PENDING, RUNNING, COMPLETED, FAILED, CANCELLED)
        #[arg(long)]
        status: Option<String>,

        /// Filter by source type
        #[arg(long)]
        source_type: Option<String>,

        #[arg(long, default_value = "50")]
        limit: i64,

        #[arg(long, default_value = "0")]
        offset: i64,
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

#[derive(Tabled)]
struct JobRow {
    id: String,
    parent_id: String,
    job_type: String,
    status: String,
    pending: i64,
    completed: i64,
    failed: i64,
    total: i64,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            parent_id: job.parent_id.clone().unwrap_or_else(|| "-".to_string()),
            job_type: job.job_type.clone(),
            status: job.status.to_string(),
            pending: job.progress.pending,
            completed: job.progress.completed,
            failed: job.progress.failed,
            total: job.progress.total,
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

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit { path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path))?;
            let definition: JobDefinition =
                serde_json::from_str(&raw).context("Invalid job definition JSON")?;

            let params = json!({ "definition": definition });
            let result = call_rpc(&cli.rpc_url, "definition.submit.v1", params).await?;

            println!("{}", "✓ Job definition submitted".green().bold());
            println!();
            println!(
                "  {} {}",
                "Definition ID:".bold(),
                result["job_definition_id"].as_str().unwrap_or("?")
            );
            println!(
                "  {} {}",
                "Final Job ID:".bold(),
                result["final_job_id"].as_str().unwrap_or("?")
            );
        }

        Commands::Get { job_id } => {
            let params = json!({ "job_id": job_id });
            let result = call_rpc(&cli.rpc_url, "job.get.v1", params).await?;
            let job: Job = serde_json::from_value(result["job"].clone())?;

            let table = Table::new(vec![JobRow::from(&job)]).to_string();
            println!("{}", table);

            if let Some(err) = &job.error {
                println!();
                println!("  {} {}", "Error:".red().bold(), err);
            }
        }

        Commands::List {
            status,
            source_type,
            limit,
            offset,
        } => {
            let params = json!({
                "status": status,
                "source_type": source_type,
                "limit": limit,
                "offset": offset,
            });

            let result = call_rpc(&cli.rpc_url, "job.list.v1", params).await?;
            let jobs: Vec<Job> = serde_json::from_value(result["jobs"].clone())?;

            if jobs.is_empty() {
                println!("{}", "No jobs found".yellow());
            } else {
                let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
                let table = Table::new(rows).to_string();
                println!("{}", table);
            }
        }
    }

    Ok(())
}
