//! # kiwi-runner
//!
//! Entry point for the Kiwi bar replay feed.
//!
//! `schedule` replays every symbol in the data directory to the collector,
//! one row per symbol per interval. `broadcast` runs the collector that
//! receives and logs those packets.
//!
//! # Usage
//!
//! ```bash
//! kiwi-runner broadcast config.json
//! kiwi-runner schedule config.json --log-level debug
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use kiwi_broadcast::BroadcastService;
use kiwi_core::KiwiError;
use kiwi_core::config::AppConfig;
use kiwi_core::tcp::BroadcastClient;
use kiwi_scheduler::{SchedulerEngine, SymbolCatalog, WorkerExit};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Kiwi historical bar replay feed.
#[derive(Parser)]
#[command(name = "kiwi-runner", about = "Kiwi historical bar replay feed")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Optional log directory for file output. Overrides `logging.log_path`.
    #[arg(long, global = true)]
    log_dir: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Replay the data directory to the collector.
    Schedule {
        /// Configuration file path (JSON).
        config: PathBuf,
    },
    /// Accept senders and log every packet received.
    Broadcast {
        /// Configuration file path (JSON).
        config: PathBuf,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Schedule { config } | Command::Broadcast { config } => config,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Command::Schedule { .. } => "kiwi-scheduler",
            Command::Broadcast { .. } => "kiwi-broadcast",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = kiwi_core::config::load_config(cli.command.config_path())?;
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    let _log_guard =
        kiwi_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name(cli.command.name()));

    info!(
        "kiwi-runner {} starting, config={}, log_level={}",
        cli.command.name(),
        cli.command.config_path().display(),
        cli.log_level
    );

    match cli.command {
        Command::Schedule { .. } => run_scheduler(&config).await,
        Command::Broadcast { .. } => run_broadcast(&config).await,
    }
}

/// Cancel `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!("failed to listen for Ctrl+C: {e}"),
        }
        token.cancel();
    });
}

async fn run_scheduler(config: &AppConfig) -> Result<()> {
    let sched = config
        .scheduler
        .as_ref()
        .ok_or_else(|| anyhow!("config has no `scheduler` section"))?;
    sched.validate()?;

    let catalog = SymbolCatalog::open(&sched.data_dir)
        .context("cannot use data directory")?
        .with_delimiter(sched.delimiter());
    let workers = catalog.load_workers();
    if workers.is_empty() {
        warn!("no schedulable symbols in {}", catalog.dir().display());
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let client = Arc::new(BroadcastClient::new(sched.collector_addr(), sched.retry_policy()));
    match client.connect(&shutdown).await {
        Ok(()) => {}
        Err(KiwiError::Cancelled) => {
            info!("cancelled while connecting, nothing sent");
            return Ok(());
        }
        Err(e) => return Err(e).context("collector unreachable"),
    }

    let engine = SchedulerEngine::new(sched.interval(), client.clone(), workers, sched.on_disconnect);
    info!("replaying {} symbol(s), press Ctrl+C to stop", engine.pending_workers());

    let reports = tokio::select! {
        reports = engine.start() => reports,
        _ = shutdown.cancelled() => {
            engine.shutdown().await;
            Vec::new()
        }
    };

    for report in &reports {
        if report.exit != WorkerExit::EndOfStream {
            warn!("[worker-{}] ended early: {:?}", report.symbol, report.exit);
        }
    }

    info!(
        "{} packet(s) delivered, collector {:?}",
        client.packets_sent().await,
        client.conn_state().await
    );
    client.close().await;
    info!("scheduler stopped, goodbye");
    Ok(())
}

async fn run_broadcast(config: &AppConfig) -> Result<()> {
    let settings = config.broadcast.clone().unwrap_or_default();
    let mut service = BroadcastService::new(&settings)?;

    let shutdown = service.shutdown_token();
    cancel_on_ctrl_c(shutdown.clone());

    match service.start().await {
        Ok(addr) => info!("broadcast server listening on {addr}, press Ctrl+C to stop"),
        Err(e) if shutdown.is_cancelled() => {
            info!("cancelled before bind completed: {e}");
            return Ok(());
        }
        Err(e) => return Err(e),
    }

    shutdown.cancelled().await;
    service.stop().await;
    info!("broadcast server stopped, goodbye");
    Ok(())
}
