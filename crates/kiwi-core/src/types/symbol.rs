//! Symbol and row-file column helpers.
//!
//! Row files are named `<SYMBOL>.csv`. Only plain four-letter uppercase tickers
//! are scheduled; anything else in the data directory is ignored.

use ahash::AHashMap;

/// Length of an accepted ticker symbol.
pub const SYMBOL_LEN: usize = 4;

/// Header columns every row file must carry, in the order rows are parsed.
pub const EXPECTED_COLUMNS: [&str; 6] = ["Date", "Close/Last", "Volume", "Open", "High", "Low"];

/// Returns `true` for exactly [`SYMBOL_LEN`] ASCII uppercase letters.
#[inline]
pub fn is_valid_symbol(sym: &str) -> bool {
    sym.len() == SYMBOL_LEN && sym.bytes().all(|b| b.is_ascii_uppercase())
}

/// Multiset comparison: same elements with the same counts, any order.
pub fn is_column_permutation<S: AsRef<str>>(found: &[S], expected: &[&str]) -> bool {
    if found.len() != expected.len() {
        return false;
    }

    let mut counts: AHashMap<&str, i64> = AHashMap::with_capacity(expected.len());
    for &col in expected {
        *counts.entry(col).or_insert(0) += 1;
    }

    for col in found {
        match counts.get_mut(col.as_ref()) {
            Some(n) if *n > 0 => *n -= 1,
            _ => return false,
        }
    }

    true
}
