//! # kiwi-core
//!
//! Core crate for the Kiwi historical bar replay feed, providing:
//!
//! - **Types** (`types`): the bar packet, symbol and column helpers
//! - **Codec** (`codec`): fixed 48-byte little-endian bar frames
//! - **TCP transport** (`tcp`): shared sending client + frame-reading server
//! - **Retry** (`retry`): bounded/unbounded, cancellation-aware retry policy
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `KiwiError` via thiserror
//! - **Logging** (`logging`): tracing-based structured logging

pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod tcp;
pub mod types;

// Re-export types at crate root for convenience.
pub use error::{KiwiError, Result};
pub use types::*;
