//! Packet consumers for the broadcast server.
//!
//! The default consumer logs every packet with its peer and keeps running
//! totals per connection in [`PacketStats`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ahash::AHashMap;
use kiwi_core::tcp::FrameHandler;
use kiwi_core::types::BarPacket;
use tracing::info;

/// Received-packet counters, shared between connection handlers.
#[derive(Debug, Default)]
pub struct PacketStats {
    total: AtomicU64,
    per_peer: Mutex<AHashMap<SocketAddr, u64>>,
    closed: AtomicU64,
}

impl PacketStats {
    pub fn record(&self, peer: SocketAddr) {
        self.total.fetch_add(1, Ordering::Relaxed);
        *self.per_peer.lock().unwrap_or_else(PoisonError::into_inner).entry(peer).or_insert(0) += 1;
    }

    fn record_close(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Packets received over all connections.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Packets received from one peer.
    pub fn from_peer(&self, peer: &SocketAddr) -> u64 {
        self.per_peer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer)
            .copied()
            .unwrap_or(0)
    }

    /// Peers that have sent at least one packet.
    pub fn peers(&self) -> usize {
        self.per_peer.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Connections that have ended.
    pub fn closed_connections(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Build the default handler: count every packet, optionally log it.
pub fn logging_handler(stats: Arc<PacketStats>, log_packets: bool) -> FrameHandler {
    let on_packet_stats = stats.clone();
    FrameHandler {
        on_packet: Arc::new(move |peer: SocketAddr, packet: BarPacket| {
            on_packet_stats.record(peer);
            if log_packets {
                info!("[conn-{peer}] {packet}");
            }
        }),
        on_disconnect: Some(Arc::new(move |peer: SocketAddr, received: u64| {
            stats.record_close();
            info!("[conn-{peer}] total received: {received}");
        })),
    }
}
