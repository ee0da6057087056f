//! # kiwi-broadcast
//!
//! Receiving side of the Kiwi feed: accepts any number of senders, decodes
//! their 48-byte bar frames and hands each packet to a consumer.
//!
//! - [`service`]: `BroadcastService` lifecycle (bind, run, stop)
//! - [`consumer`]: logging consumer and per-peer packet stats

pub mod consumer;
pub mod service;

pub use consumer::{PacketStats, logging_handler};
pub use service::BroadcastService;
