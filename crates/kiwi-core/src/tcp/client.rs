//! Outbound TCP client that pushes bar frames to the collector.
//!
//! One [`BroadcastClient`] is shared (behind an `Arc`) by every scheduler
//! worker. The connection and its health live under a single async mutex that
//! also covers the physical write, so concurrent `send` calls never interleave
//! bytes on the wire.
//!
//! ```text
//! Disconnected ──connect──► Connecting ──ok──► Connected ──write error──► Disconnected
//!                               │
//!                               └──exhausted / cancelled──► Disconnected
//! ```
//!
//! `send` never reconnects on its own. Reconnecting is the caller's decision,
//! via [`BroadcastClient::connect`] or [`BroadcastClient::reconnect`].

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{KiwiError, Result};
use crate::retry::RetryPolicy;
use crate::types::BarPacket;

/// Connection phase as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

struct ClientState {
    phase: ConnState,
    stream: Option<TcpStream>,
    sent: u64,
}

/// Shared TCP client for the collector connection.
pub struct BroadcastClient {
    addr: String,
    retry: RetryPolicy,
    state: Mutex<ClientState>,
    /// Held for the whole of a reconnect so only one worker dials at a time.
    reconnect_lock: Mutex<()>,
}

impl BroadcastClient {
    /// Create a disconnected client for `addr` (`host:port`).
    pub fn new(addr: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            addr: addr.into(),
            retry,
            state: Mutex::new(ClientState { phase: ConnState::Disconnected, stream: None, sent: 0 }),
            reconnect_lock: Mutex::new(()),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Dial a fresh connection, retrying per the client's [`RetryPolicy`].
    ///
    /// Any existing connection is dropped first. Fails with
    /// [`KiwiError::ConnectionExhausted`] when a bounded budget runs out and
    /// with [`KiwiError::Cancelled`] when `cancel` fires; both leave the client
    /// disconnected.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.stream = None;
            state.phase = ConnState::Connecting;
        }

        let addr = self.addr.as_str();
        let result = self.retry.run(addr, cancel, |_| TcpStream::connect(addr)).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("[{addr}] set_nodelay failed: {e}");
                }
                state.stream = Some(stream);
                state.phase = ConnState::Connected;
                info!("[{addr}] connected");
                Ok(())
            }
            Err(e) => {
                state.stream = None;
                state.phase = ConnState::Disconnected;
                Err(e)
            }
        }
    }

    /// Reconnect unless another caller already did.
    ///
    /// Callers queue on a dedicated lock; whoever gets it second finds the
    /// client healthy and returns without dialing.
    pub async fn reconnect(&self, cancel: &CancellationToken) -> Result<()> {
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(KiwiError::Cancelled),
            guard = self.reconnect_lock.lock() => guard,
        };

        if self.is_connected().await {
            return Ok(());
        }

        warn!("[{}] reconnecting", self.addr);
        self.connect(cancel).await
    }

    /// Write one frame.
    ///
    /// Fails with [`KiwiError::NotConnected`] unless connected. On a write
    /// error the connection is dropped, the client becomes disconnected for
    /// every caller, and the packet is lost.
    pub async fn send(&self, packet: &BarPacket) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(stream) = state.stream.as_mut() else {
            return Err(KiwiError::NotConnected);
        };

        match codec::write_packet(stream, packet).await {
            Ok(()) => {
                state.sent += 1;
                Ok(())
            }
            Err(e) => {
                state.stream = None;
                state.phase = ConnState::Disconnected;
                warn!("[{}] write failed, marking disconnected: {e}", self.addr);
                Err(KiwiError::Send(e))
            }
        }
    }

    /// Snapshot of connection health.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.phase == ConnState::Connected
    }

    pub async fn conn_state(&self) -> ConnState {
        self.state.lock().await.phase
    }

    /// Frames written successfully since construction.
    pub async fn packets_sent(&self) -> u64 {
        self.state.lock().await.sent
    }

    /// Release the connection. Safe to call any number of times.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.phase = ConnState::Disconnected;
        if let Some(mut stream) = state.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("[{}] shutdown: {e}", self.addr);
            }
            info!("[{}] connection closed", self.addr);
        }
    }
}
