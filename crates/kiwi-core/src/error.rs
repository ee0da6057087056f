//! Typed error definitions for the Kiwi replay feed.
//!
//! Provides [`KiwiError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use std::io;

use thiserror::Error;

/// Domain-specific errors for the Kiwi replay feed.
#[derive(Debug, Error)]
pub enum KiwiError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// The data directory is missing, not a directory, or unreadable.
    #[error("data directory error: {0}")]
    DataDir(String),

    /// A row source header is not a permutation of the expected columns.
    #[error("schema mismatch for {symbol}: found {found:?}")]
    SchemaMismatch { symbol: String, found: Vec<String> },

    /// Non-EOF failure while pulling a row from a row source.
    #[error("row read error: {0}")]
    RowRead(String),

    /// A row has the wrong arity or a field that is not a valid number.
    #[error("packet parse error: {0}")]
    PacketParse(String),

    /// `send` was called while the transport has no healthy connection.
    #[error("not connected")]
    NotConnected,

    /// The bounded connect/bind retry budget was used up.
    #[error("{addr}: gave up after {attempts} attempt(s): {source}")]
    ConnectionExhausted {
        addr: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// A write on an established connection failed; the packet is lost.
    #[error("send error: {0}")]
    Send(#[source] io::Error),

    /// A frame could not be read completely from a connection.
    #[error("frame read error: {0}")]
    FrameRead(#[source] io::Error),

    /// A byte slice handed to the decoder was not exactly one frame long.
    #[error("frame size error: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    /// The operation observed its cancellation token.
    #[error("cancelled")]
    Cancelled,
}

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, KiwiError>;
