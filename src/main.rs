//! Jira facade
//!
//! Main entry point for the jira-facade CLI.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use jira_facade::config::{JiraConfig, Timeouts};
use jira_facade::hierarchy::{
    write_hierarchy, HierarchyAssembler, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_FILE,
};
use jira_facade::jira::{FieldResolver, JiraClient};
use jira_facade::server::{FacadeServer, ServerConfig};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

/// REST facade over Jira Cloud boards, epics, stories, tasks and subtasks
#[derive(Parser, Debug)]
#[command(name = "jira-facade")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, env = "FACADE_BIND", default_value = "127.0.0.1:8000")]
        bind: String,

        /// File written by GET /hierarchy/save
        #[arg(long, env = "FACADE_OUTPUT", default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,

        /// Maximum request body size in bytes
        #[arg(long, env = "FACADE_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
        max_upload_bytes: usize,

        /// Remote calls a hierarchy walk keeps in flight
        #[arg(long, env = "FACADE_MAX_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
        max_concurrency: usize,

        #[command(flatten)]
        timeouts: TimeoutArgs,
    },

    /// Build the hierarchy once and write it to a file
    Export {
        /// Output file
        #[arg(short, long, env = "FACADE_OUTPUT", default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,

        /// Remote calls the walk keeps in flight
        #[arg(long, env = "FACADE_MAX_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
        max_concurrency: usize,

        #[command(flatten)]
        timeouts: TimeoutArgs,
    },
}

/// Per-request timeouts, in seconds
#[derive(Args, Debug)]
struct TimeoutArgs {
    /// Timeout for single fetches
    #[arg(long, env = "FACADE_GET_TIMEOUT", default_value_t = 10)]
    get_timeout: u64,

    /// Timeout for JQL searches
    #[arg(long, env = "FACADE_SEARCH_TIMEOUT", default_value_t = 30)]
    search_timeout: u64,

    /// Timeout for writes and uploads
    #[arg(long, env = "FACADE_WRITE_TIMEOUT", default_value_t = 15)]
    write_timeout: u64,
}

impl TimeoutArgs {
    fn to_timeouts(&self) -> Timeouts {
        Timeouts {
            get: Duration::from_secs(self.get_timeout),
            search: Duration::from_secs(self.search_timeout),
            write: Duration::from_secs(self.write_timeout),
        }
    }
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine; real environment variables still apply
    dotenvy::dotenv().ok();

    if let Err(e) = jira_facade::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn client_for(timeouts: &TimeoutArgs) -> anyhow::Result<JiraClient> {
    let config = JiraConfig::from_env()
        .context("Jira credentials are not configured")?
        .with_timeouts(timeouts.to_timeouts());
    let client = JiraClient::new(&config).context("Failed to create Jira client")?;
    Ok(client)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            bind,
            output,
            max_upload_bytes,
            max_concurrency,
            timeouts,
        } => {
            let client = client_for(&timeouts)?;
            let config = ServerConfig {
                output_path: output,
                max_body_size: max_upload_bytes,
                max_concurrency,
            };
            FacadeServer::new(client, config)
                .run(&bind)
                .await
                .with_context(|| format!("Server on {} failed", bind))?;
        }

        Commands::Export {
            output,
            max_concurrency,
            timeouts,
        } => {
            let client = client_for(&timeouts)?;
            let fields = FieldResolver::new();
            let report = HierarchyAssembler::with_concurrency(&client, &fields, max_concurrency)
                .build_report()
                .await
                .context("Failed to build hierarchy")?;

            write_hierarchy(&output, &report.boards)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;

            println!(
                "Saved {} boards to {} ({} items skipped)",
                report.boards.len(),
                output.display(),
                report.skipped.len()
            );
            for item in &report.skipped {
                println!("  skipped {} {}: {}", item.level, item.key, item.reason);
            }
        }
    }

    Ok(())
}
