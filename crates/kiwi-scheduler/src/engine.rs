//! The scheduler engine: one paced worker per symbol, one shared client.
//!
//! # Architecture
//!
//! ```text
//! SymbolWorker ──► [sleep interval] ──► next_row ──► parse ──► BroadcastClient.send
//!      ×N                 ▲                                           │
//!                         └───────────────── next tick ◄──────────────┘
//! ```
//!
//! Workers are independent tokio tasks. The only shared state is the
//! [`BroadcastClient`], whose lock covers the physical write and nothing else,
//! so a worker's pacing sleep never blocks another worker.
//!
//! Every failure is worker-local: a read error, a malformed row or a lost
//! connection stops (or skips within) that symbol only. Cancellation is seen
//! at the top of each iteration and during the pacing sleep, so
//! [`SchedulerEngine::shutdown`] completes within about one interval.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use kiwi_core::config::DisconnectPolicy;
use kiwi_core::error::KiwiError;
use kiwi_core::tcp::BroadcastClient;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::parse::parse_bar_row;
use crate::row_source::RowSource;

/// One symbol's stream: its name and its exclusively owned row source.
pub struct SymbolWorker {
    symbol: String,
    source: Box<dyn RowSource>,
}

impl SymbolWorker {
    pub fn new(symbol: impl Into<String>, source: Box<dyn RowSource>) -> Self {
        Self { symbol: symbol.into(), source }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The row source ran out of rows.
    EndOfStream,
    /// The row source failed.
    ReadError,
    /// A row could not be turned into a packet.
    ParseError,
    /// The collector connection was down and the policy gave up.
    Disconnected,
    /// Shutdown was requested.
    Cancelled,
}

/// Per-worker outcome returned by [`SchedulerEngine::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub symbol: String,
    pub exit: WorkerExit,
    /// Rows pulled from the source.
    pub rows: u64,
    /// Packets written to the collector.
    pub sent: u64,
    /// Packets lost to a failed write.
    pub send_failures: u64,
    /// Packets dropped because the connection was down.
    pub skipped: u64,
}

impl WorkerReport {
    fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            exit: WorkerExit::Cancelled,
            rows: 0,
            sent: 0,
            send_failures: 0,
            skipped: 0,
        }
    }
}

/// Settings every worker reads.
#[derive(Clone)]
struct WorkerShared {
    interval: Duration,
    client: Arc<BroadcastClient>,
    on_disconnect: DisconnectPolicy,
}

/// Owns the symbol workers and starts/stops them together.
pub struct SchedulerEngine {
    shared: WorkerShared,
    /// Workers not yet launched. Emptied by `start`.
    pending: Mutex<Vec<SymbolWorker>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl SchedulerEngine {
    pub fn new(
        interval: Duration,
        client: Arc<BroadcastClient>,
        workers: Vec<SymbolWorker>,
        on_disconnect: DisconnectPolicy,
    ) -> Self {
        Self {
            shared: WorkerShared { interval, client, on_disconnect },
            pending: Mutex::new(workers),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Workers waiting to be launched.
    pub fn pending_workers(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Launch every worker and wait until all of them have stopped.
    ///
    /// Workers are launched once; a second call returns an empty report.
    /// After [`shutdown`](Self::shutdown) nothing is spawned: pending workers
    /// are released on the spot and reported as cancelled.
    pub async fn start(&self) -> Vec<WorkerReport> {
        let mut reports = Vec::new();

        // Spawn under the pending lock so `shutdown` sees every launched task.
        let handles: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if self.cancel.is_cancelled() {
                reports.extend(pending.drain(..).map(|worker| WorkerReport::new(worker.symbol())));
                Vec::new()
            } else {
                info!(
                    "starting {} worker(s), interval {:?}, on_disconnect {:?}",
                    pending.len(),
                    self.shared.interval,
                    self.shared.on_disconnect
                );

                let handles = pending
                    .drain(..)
                    .map(|worker| {
                        let shared = self.shared.clone();
                        let cancel = self.cancel.child_token();
                        self.tracker.spawn(run_worker(worker, shared, cancel))
                    })
                    .collect();
                self.tracker.close();
                handles
            }
        };

        for handle in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => error!("worker task failed: {e}"),
            }
        }

        let sent: u64 = reports.iter().map(|r| r.sent).sum();
        info!("all {} worker(s) stopped, {sent} packet(s) sent", reports.len());
        reports
    }

    /// Cancel every worker and wait until all have exited.
    ///
    /// May be called before, during or after [`start`](Self::start).
    pub async fn shutdown(&self) {
        info!("shutdown requested");
        self.cancel.cancel();
        {
            let _pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            self.tracker.close();
        }
        self.tracker.wait().await;
        info!("all workers exited");
    }
}

async fn run_worker(worker: SymbolWorker, shared: WorkerShared, cancel: CancellationToken) -> WorkerReport {
    let SymbolWorker { symbol, mut source } = worker;
    let label = format!("worker-{symbol}");
    let mut report = WorkerReport::new(&symbol);
    let client = &shared.client;

    debug!("[{label}] started");

    let exit = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break WorkerExit::Cancelled,
            _ = tokio::time::sleep(shared.interval) => {}
        }

        let row = match source.next_row() {
            Ok(Some(row)) => row,
            Ok(None) => {
                info!("[{label}] reached end of history after {} row(s)", source.position());
                break WorkerExit::EndOfStream;
            }
            Err(e) => {
                warn!("[{label}] {e}");
                break WorkerExit::ReadError;
            }
        };
        report.rows += 1;

        let packet = match parse_bar_row(&row) {
            Ok(packet) => packet,
            Err(e) => {
                error!("[{label}] row {}: {e}", source.position());
                break WorkerExit::ParseError;
            }
        };

        if !client.is_connected().await {
            match shared.on_disconnect {
                DisconnectPolicy::Terminate => {
                    error!("[{label}] collector {} not connected, stopping", client.addr());
                    break WorkerExit::Disconnected;
                }
                DisconnectPolicy::Skip => {
                    report.skipped += 1;
                    warn!("[{label}] collector not connected, dropping row {}", source.position());
                    continue;
                }
                DisconnectPolicy::Reconnect => match client.reconnect(&cancel).await {
                    Ok(()) => {}
                    Err(KiwiError::Cancelled) => break WorkerExit::Cancelled,
                    Err(e) => {
                        error!("[{label}] reconnect failed, stopping: {e}");
                        break WorkerExit::Disconnected;
                    }
                },
            }
        }

        match client.send(&packet).await {
            Ok(()) => {
                report.sent += 1;
                debug!("[{label}] sent {packet}");
            }
            Err(e) => {
                report.send_failures += 1;
                warn!("[{label}] send failed: {e}");
            }
        }
    };

    // Release the row source before reporting.
    drop(source);
    report.exit = exit;
    info!(
        "[{label}] exited ({exit:?}): rows={} sent={} failed={} skipped={}",
        report.rows, report.sent, report.send_failures, report.skipped
    );
    report
}
