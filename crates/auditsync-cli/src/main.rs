//! Auditsync CLI
//!
//! The `auditsync` command pulls new audit log events for one account and
//! prints each one to stdout as a flattened `key=value` line. Logs go to
//! stderr so stdout can be piped straight into a log shipper.
//!
//! ## Commands
//!
//! - `run`: one synchronisation run (Ctrl-C stops between pages)
//! - `state show`: print the stored checkpoint
//! - `state reset`: forget the stored checkpoint

use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn, Level};

use auditsync_core::config::{DEFAULT_API_HOST, DEFAULT_MAX_ENTRIES, DEFAULT_REQUEST_TIMEOUT_SECS};
use auditsync_core::{
    AccountType, EventTypes, HttpTransport, RunCompletion, SyncConfig, SyncOrchestrator,
    SyncRunner, WriterSink,
};
use auditsync_state::{CheckpointStore, FileCheckpointStore};

#[derive(Parser)]
#[command(name = "auditsync")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Incremental GitHub audit log synchronisation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new events for one account and print them to stdout
    Run(RunArgs),

    /// Inspect or reset the stored checkpoint
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print the stored checkpoint as JSON
    Show(AccountArgs),
    /// Delete the stored checkpoint; the next run starts from the first page
    Reset(AccountArgs),
}

#[derive(Args, Debug, Clone)]
struct AccountArgs {
    /// Organization or enterprise slug
    #[arg(long, env = "AUDITSYNC_ACCOUNT")]
    account: String,

    /// Directory holding `<account>_state.json`
    #[arg(long, env = "AUDITSYNC_STATE_DIR", default_value = ".")]
    state_dir: PathBuf,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    target: AccountArgs,

    /// Access token with audit log read scope
    #[arg(long, env = "AUDITSYNC_TOKEN", hide_env_values = true)]
    token: String,

    /// API host (`api.github.com` or an Enterprise Server hostname)
    #[arg(long, env = "AUDITSYNC_HOST", default_value = DEFAULT_API_HOST)]
    host: String,

    /// `organization` or `enterprise`
    #[arg(long, env = "AUDITSYNC_ACCOUNT_TYPE", default_value = "enterprise")]
    account_type: AccountType,

    /// `web`, `git` or `all`
    #[arg(long, env = "AUDITSYNC_EVENT_TYPES", default_value = "all")]
    event_types: EventTypes,

    /// Stop after at least this many entries; the next run picks up from there
    #[arg(long, env = "AUDITSYNC_MAX_ENTRIES", default_value_t = DEFAULT_MAX_ENTRIES)]
    max_entries: usize,

    /// Accept self-signed TLS certificates
    #[arg(long, env = "AUDITSYNC_INSECURE")]
    insecure: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl RunArgs {
    fn to_config(&self) -> SyncConfig {
        SyncConfig::new(self.target.account.clone(), self.token.clone())
            .with_host(self.host.clone())
            .with_account_type(self.account_type)
            .with_event_types(self.event_types)
            .with_max_entries(self.max_entries)
            .with_verify_tls(!self.insecure)
            .with_request_timeout(std::time::Duration::from_secs(self.timeout_secs))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    auditsync_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(&args).await,
        Commands::State { action } => match action {
            StateAction::Show(target) => cmd_state_show(&target).await,
            StateAction::Reset(target) => cmd_state_reset(&target).await,
        },
    }
}

fn open_store(dir: &Path) -> Result<FileCheckpointStore> {
    FileCheckpointStore::new(dir)
        .with_context(|| format!("Failed to open state directory {:?}", dir))
}

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let config = args.to_config();
    config.validate().context("Invalid configuration")?;

    let transport = HttpTransport::new(&config).context("Failed to build HTTP client")?;
    let store = open_store(&args.target.state_dir)?;
    let orchestrator = SyncOrchestrator::new(Arc::new(transport), config)?;
    let runner = SyncRunner::new(orchestrator, Arc::new(store));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping before the next page");
            shutdown_tx.send_replace(true);
        }
    });

    let mut sink = WriterSink::new(BufWriter::new(std::io::stdout()));
    let report = runner
        .run_once(&mut sink, Some(&shutdown_rx))
        .await
        .with_context(|| format!("Sync failed for account '{}'", args.target.account))?;

    match report.completion {
        RunCompletion::Cancelled => {
            warn!(run_id = %report.run_id, "run cancelled; checkpoint left unchanged")
        }
        RunCompletion::MaxEntriesReached => info!(
            run_id = %report.run_id,
            forwarded = report.forwarded,
            "entry cap reached; the next run continues from here"
        ),
        RunCompletion::Completed => info!(
            run_id = %report.run_id,
            forwarded = report.forwarded,
            pages = report.pages_fetched,
            "run complete"
        ),
    }
    Ok(())
}

async fn cmd_state_show(target: &AccountArgs) -> Result<()> {
    let store = open_store(&target.state_dir)?;
    match store.load(&target.account).await? {
        Some(checkpoint) => println!("{}", serde_json::to_string_pretty(&checkpoint)?),
        None => println!("No checkpoint stored for '{}'", target.account),
    }
    Ok(())
}

async fn cmd_state_reset(target: &AccountArgs) -> Result<()> {
    let store = open_store(&target.state_dir)?;
    store
        .clear(&target.account)
        .await
        .with_context(|| format!("Failed to reset checkpoint for '{}'", target.account))?;
    println!("Cleared checkpoint for '{}'", target.account);
    Ok(())
}
