//! TCP transport for bar frames: the outbound client and the inbound server.

pub mod client;
pub mod server;

pub use client::{BroadcastClient, ConnState};
pub use server::{ConnExit, FrameHandler, FrameServer, OnDisconnectCallback, OnPacketCallback};
