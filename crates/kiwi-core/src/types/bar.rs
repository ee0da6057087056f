//! The bar packet: one OHLCV price record for a symbol at a point in time.
//!
//! The packet carries no symbol on the wire. Receivers attribute bars to a
//! stream by connection, not by content.
//!
//! # Equality
//!
//! Two packets are equal when every field has the same bit pattern. This makes
//! `NaN` equal to itself and distinguishes `0.0` from `-0.0`, which is what the
//! codec round-trip guarantees.

/// A single price bar as replayed to the collector.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarPacket {
    /// Epoch timestamp as found in the source row.
    pub timestamp: i64,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: i64,
}

impl BarPacket {
    pub fn new(timestamp: i64, open: f64, close: f64, high: f64, low: f64, volume: i64) -> Self {
        Self { timestamp, open, close, high, low, volume }
    }
}

impl PartialEq for BarPacket {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.open.to_bits() == other.open.to_bits()
            && self.close.to_bits() == other.close.to_bits()
            && self.high.to_bits() == other.high.to_bits()
            && self.low.to_bits() == other.low.to_bits()
            && self.volume == other.volume
    }
}

impl Eq for BarPacket {}

impl std::fmt::Display for BarPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bar(ts={} o={:.4} h={:.4} l={:.4} c={:.4} v={})",
            self.timestamp, self.open, self.high, self.low, self.close, self.volume
        )
    }
}
