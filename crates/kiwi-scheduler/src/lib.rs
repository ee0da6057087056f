//! # kiwi-scheduler
//!
//! Replays per-symbol bar history to a collector at a fixed pace.
//!
//! ## Architecture
//!
//! [`catalog::SymbolCatalog`] discovers `<SYMBOL>.csv` files and turns each
//! valid one into a [`engine::SymbolWorker`]. The [`engine::SchedulerEngine`]
//! runs one task per worker; each task sleeps the interval, pulls a row,
//! parses it into a bar packet and pushes it through the shared
//! [`kiwi_core::tcp::BroadcastClient`].
//!
//! - [`row_source`]: `RowSource` trait + CSV implementation
//! - [`parse`]: row → bar packet
//! - [`catalog`]: data directory discovery and validation
//! - [`engine`]: pacing workers, cancellation and join

pub mod catalog;
pub mod engine;
pub mod parse;
pub mod row_source;

pub use catalog::SymbolCatalog;
pub use engine::{SchedulerEngine, SymbolWorker, WorkerExit, WorkerReport};
pub use row_source::{CsvRowSource, RowSource};
