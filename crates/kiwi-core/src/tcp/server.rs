//! Inbound TCP listener that decodes bar frames from many senders.
//!
//! Each accepted connection gets its own tokio task reading exact 48-byte
//! frames and handing each decoded [`BarPacket`] to an [`OnPacketCallback`].
//! A failing connection only ends its own task. The server never writes back
//! and never throttles a sender.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::codec::read_packet;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::types::BarPacket;

/// Callback invoked for each received packet.
///
/// Parameters: `(peer_address, packet)`
pub type OnPacketCallback = Arc<dyn Fn(SocketAddr, BarPacket) + Send + Sync>;

/// Callback invoked once when a connection ends.
///
/// Parameters: `(peer_address, packets_received)`
pub type OnDisconnectCallback = Arc<dyn Fn(SocketAddr, u64) + Send + Sync>;

/// Consumer hooks for a [`FrameServer`].
#[derive(Clone)]
pub struct FrameHandler {
    pub on_packet: OnPacketCallback,
    pub on_disconnect: Option<OnDisconnectCallback>,
}

/// How a connection handler ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnExit {
    /// Peer closed on a frame boundary.
    Closed,
    /// Read error or EOF inside a frame.
    Failed,
    /// Server shutdown.
    Cancelled,
}

/// Pause after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A bound listener, ready to [`run`](FrameServer::run).
pub struct FrameServer {
    listener: TcpListener,
    tracker: TaskTracker,
}

impl FrameServer {
    /// Bind `addr`, retrying per `retry`. Exhaustion and cancellation are
    /// returned to the caller.
    pub async fn bind(addr: &str, retry: &RetryPolicy, cancel: &CancellationToken) -> Result<Self> {
        let listener = retry.run(addr, cancel, |_| TcpListener::bind(addr)).await?;
        info!("[{addr}] listening");
        Ok(Self { listener, tracker: TaskTracker::new() })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `cancel` fires, then wait for every handler
    /// to exit.
    pub async fn run(self, handler: FrameHandler, cancel: CancellationToken) {
        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("accept failed: {e}, retrying in {ACCEPT_BACKOFF:?}");
                        if accept_backoff(&cancel).await {
                            continue;
                        }
                        break;
                    }
                },
            };

            info!("[conn-{peer}] new connection");
            let handler = handler.clone();
            let cancel = cancel.child_token();
            self.tracker.spawn(async move {
                handle_connection(stream, peer, handler, cancel).await;
            });
        }

        self.tracker.close();
        info!("accept loop stopped, waiting for {} connection(s)", self.tracker.len());
        self.tracker.wait().await;
    }
}

/// Sleep [`ACCEPT_BACKOFF`]. Returns `false` if cancelled first.
async fn accept_backoff(cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => true,
    }
}

/// Read frames from one peer until it closes, fails, or the server stops.
pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: FrameHandler,
    cancel: CancellationToken,
) -> ConnExit {
    let mut received: u64 = 0;

    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break ConnExit::Cancelled,
            next = read_packet(&mut stream) => next,
        };

        match next {
            Ok(Some(packet)) => {
                received += 1;
                (handler.on_packet)(peer, packet);
            }
            Ok(None) => {
                info!("[conn-{peer}] disconnected");
                break ConnExit::Closed;
            }
            Err(e) => {
                warn!("[conn-{peer}] {e}");
                break ConnExit::Failed;
            }
        }
    };

    info!("[conn-{peer}] closed after {received} packet(s)");
    if let Some(cb) = &handler.on_disconnect {
        cb(peer, received);
    }
    exit
}
