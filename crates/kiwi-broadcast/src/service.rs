//! Broadcast service: binds the listener and runs the accept loop.
//!
//! Configuration is read from the `broadcast` section of the JSON config.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use kiwi_core::config::BroadcastConfig;
use kiwi_core::retry::RetryPolicy;
use kiwi_core::tcp::FrameServer;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::consumer::{PacketStats, logging_handler};

/// Receiving side of the feed.
pub struct BroadcastService {
    listen_addr: String,
    retry: RetryPolicy,
    log_packets: bool,
    stats: Arc<PacketStats>,
    cancel: CancellationToken,
    /// Background accept-loop task handle.
    task: Option<tokio::task::JoinHandle<()>>,
}

impl BroadcastService {
    /// Create the service from config. Nothing is bound until
    /// [`start`](Self::start).
    pub fn new(config: &BroadcastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            listen_addr: config.listen_addr(),
            retry: config.retry_policy(),
            log_packets: config.log_packets(),
            stats: Arc::new(PacketStats::default()),
            cancel: CancellationToken::new(),
            task: None,
        })
    }

    /// Token that stops the service, including a bind still retrying.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> Arc<PacketStats> {
        self.stats.clone()
    }

    /// Bind (with retry) and start accepting. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.task.is_some() {
            return Err(anyhow!("broadcast service already started"));
        }

        let server = FrameServer::bind(&self.listen_addr, &self.retry, &self.cancel).await?;
        let local = server.local_addr()?;
        let handler = logging_handler(self.stats.clone(), self.log_packets);

        info!("[broadcast] accepting on {local}");
        self.task = Some(tokio::spawn(server.run(handler, self.cancel.clone())));
        Ok(local)
    }

    /// Wait until the accept loop ends (it only ends on shutdown).
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("[broadcast] accept loop failed: {e}");
            }
        }
    }

    /// Stop accepting, close every connection and wait for the handlers.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        self.wait().await;
        info!(
            "[broadcast] stopped: {} packet(s) from {} peer(s)",
            self.stats.total(),
            self.stats.peers()
        );
    }
}
