//! Row → [`BarPacket`] conversion.
//!
//! Rows arrive in header order `Date, Close/Last, Volume, Open, High, Low`,
//! which is not the wire order.

use kiwi_core::error::{KiwiError, Result};
use kiwi_core::types::{BarPacket, EXPECTED_COLUMNS};

const TIMESTAMP: usize = 0;
const CLOSE: usize = 1;
const VOLUME: usize = 2;
const OPEN: usize = 3;
const HIGH: usize = 4;
const LOW: usize = 5;

fn int_field<S: AsRef<str>>(row: &[S], idx: usize) -> Result<i64> {
    let raw = row[idx].as_ref().trim();
    raw.parse::<i64>()
        .map_err(|e| KiwiError::PacketParse(format!("{} {raw:?}: {e}", EXPECTED_COLUMNS[idx])))
}

fn float_field<S: AsRef<str>>(row: &[S], idx: usize) -> Result<f64> {
    let raw = row[idx].as_ref().trim();
    raw.parse::<f64>()
        .map_err(|e| KiwiError::PacketParse(format!("{} {raw:?}: {e}", EXPECTED_COLUMNS[idx])))
}

/// Parse one six-field row into a packet.
pub fn parse_bar_row<S: AsRef<str>>(row: &[S]) -> Result<BarPacket> {
    if row.len() != EXPECTED_COLUMNS.len() {
        return Err(KiwiError::PacketParse(format!(
            "expected {} fields, got {}",
            EXPECTED_COLUMNS.len(),
            row.len()
        )));
    }

    Ok(BarPacket {
        timestamp: int_field(row, TIMESTAMP)?,
        open: float_field(row, OPEN)?,
        close: float_field(row, CLOSE)?,
        high: float_field(row, HIGH)?,
        low: float_field(row, LOW)?,
        volume: int_field(row, VOLUME)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_header_order_to_packet_fields() {
        let bar = parse_bar_row(&["1", "101.0", "500", "100.0", "102.0", "99.0"]).unwrap();
        assert_eq!(bar, BarPacket::new(1, 100.0, 101.0, 102.0, 99.0, 500));
    }

    #[test]
    fn accepts_negative_and_non_finite() {
        let bar = parse_bar_row(&["-5", "inf", "-1", "NaN", "-0", "1e300"]).unwrap();
        assert_eq!(bar.timestamp, -5);
        assert_eq!(bar.volume, -1);
        assert!(bar.close.is_infinite());
        assert!(bar.open.is_nan());
        assert!(bar.high.is_sign_negative());
        assert_eq!(bar.low, 1e300);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let err = parse_bar_row(&["1", "2", "3"]).unwrap_err();
        assert!(matches!(err, KiwiError::PacketParse(msg) if msg.contains("got 3")));

        let seven = ["1", "2", "3", "4", "5", "6", "7"];
        assert!(parse_bar_row(&seven).is_err());
    }

    #[test]
    fn non_numeric_fields_are_rejected() {
        // Date must be an integer timestamp, not a calendar date.
        assert!(parse_bar_row(&["10/15/2024", "1", "1", "1", "1", "1"]).is_err());
        // Volume is an integer.
        assert!(parse_bar_row(&["1", "1", "1.5", "1", "1", "1"]).is_err());
        // Prices must not carry a currency sign.
        let err = parse_bar_row(&["1", "$233.85", "1", "1", "1", "1"]).unwrap_err();
        assert!(matches!(err, KiwiError::PacketParse(msg) if msg.starts_with("Close/Last")));
    }
}
