use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tix_lib::config::{Config, DEFAULT_DB_PATH, DEFAULT_NOTIFY_TIMEOUT_MS, DEFAULT_STORE_TIMEOUT_MS};
use tix_lib::{exit_code_for, now, App, IngestRequest};
use tix_core::error::AppError;
use tracing_subscriber::EnvFilter;

/// Ticket deduplication and SLA tracking
#[derive(Parser, Debug)]
#[command(name = "tix", version, about, long_about = None)]
struct Cli {
    /// SQLite database holding the tickets
    #[arg(long, env = "TIX_DB_PATH", default_value = DEFAULT_DB_PATH, global = true)]
    db: PathBuf,

    /// Incoming-webhook URL for chat notifications (unset disables them)
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true, global = true)]
    webhook_url: Option<String>,

    /// Webhook request timeout in milliseconds
    #[arg(long, env = "TIX_NOTIFY_TIMEOUT_MS", default_value_t = DEFAULT_NOTIFY_TIMEOUT_MS, global = true)]
    notify_timeout_ms: u64,

    /// How long to wait for the database write lock, in milliseconds
    #[arg(long, env = "TIX_STORE_TIMEOUT_MS", default_value_t = DEFAULT_STORE_TIMEOUT_MS, global = true)]
    store_timeout_ms: u64,

    /// Enable debug logging (overrides TIX_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or migrate the database
    Init,
    /// Report an incident; duplicates merge into the existing ticket
    Ingest {
        #[arg(long)]
        project: String,
        /// Dedup key within the project; derived from title, category and location if omitted
        #[arg(long)]
        fingerprint: Option<String>,
        #[arg(long)]
        title: String,
        /// LOW, MEDIUM, HIGH or CRITICAL
        #[arg(long)]
        severity: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        location: String,
        /// Reject severities outside LOW, MEDIUM, HIGH, CRITICAL
        #[arg(long)]
        strict_severity: bool,
    },
    /// List tickets, most recently seen first
    List {
        #[arg(long)]
        project: Option<String>,
    },
    /// Resolve a ticket and record SLA breach
    Resolve {
        #[arg(value_name = "TICKET_ID")]
        ticket_id: String,
    },
    /// Write a Markdown summary of a ticket
    Export {
        #[arg(value_name = "TICKET_ID")]
        ticket_id: String,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TIX_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to encode command output")?;
    println!("{out}");
    Ok(())
}

fn run(app: &App, command: Command) -> anyhow::Result<Result<(), AppError>> {
    let outcome = match command {
        Command::Init => app.init().map(|r| print_json(&r)),
        Command::Ingest {
            project,
            fingerprint,
            title,
            severity,
            category,
            location,
            strict_severity,
        } => app
            .ingest(
                IngestRequest {
                    project_id: project,
                    fingerprint,
                    title,
                    severity,
                    category,
                    location,
                    strict_severity,
                },
                now(),
            )
            .map(|r| print_json(&r)),
        Command::List { project } => app.list(project.as_deref()).map(|r| print_json(&r)),
        Command::Resolve { ticket_id } => app.resolve(&ticket_id, now()).map(|r| print_json(&r)),
        Command::Export { ticket_id, out } => app.export(&ticket_id, &out).map(|r| print_json(&r)),
    };

    match outcome {
        Ok(printed) => printed.map(Ok),
        Err(e) => Ok(Err(e)),
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config {
        db_path: cli.db,
        webhook_url: cli.webhook_url,
        notify_timeout: Duration::from_millis(cli.notify_timeout_ms),
        store_timeout: Duration::from_millis(cli.store_timeout_ms),
    };
    tracing::debug!(db_path = %config.db_path.display(), "starting tix");
    let app = App::new(config);

    match run(&app, cli.command)? {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!(code = %e.code, "{}", e.message);
            let out = serde_json::to_string_pretty(&e).context("failed to encode error")?;
            eprintln!("{out}");
            Ok(ExitCode::from(exit_code_for(&e)))
        }
    }
}
