//! Core data types: the bar packet and symbol/column helpers.
//!
//! The bar packet is the only record that crosses the wire; everything else in
//! here describes where bars come from (symbols, row-file columns).

pub mod bar;
pub mod symbol;

pub use bar::*;
pub use symbol::*;
