//! Sequential row providers, one per symbol.
//!
//! A [`RowSource`] yields raw field tuples in file order exactly once. It is
//! owned by a single worker, so it needs `Send` but not `Sync`. Dropping a
//! source releases its file handle.

use std::fs::File;
use std::path::{Path, PathBuf};

use kiwi_core::error::{KiwiError, Result};
use kiwi_core::types::is_column_permutation;

/// Ordered, non-restartable source of raw rows for one symbol.
pub trait RowSource: Send {
    /// Next row, `Ok(None)` at end-of-stream, `Err` on read failure.
    ///
    /// Calling again after end-of-stream is an error, not a second `None`.
    fn next_row(&mut self) -> Result<Option<Vec<String>>>;

    /// Header columns as found in the source.
    fn headers(&self) -> &[String];

    /// Data rows consumed so far.
    fn position(&self) -> u64;

    /// `true` iff the header is a multiset-equal permutation of `expected`.
    fn validate_schema(&self, expected: &[&str]) -> bool {
        is_column_permutation(self.headers(), expected)
    }
}

/// CSV file row source.
///
/// After [`align_to`](CsvRowSource::align_to), rows come out in the expected
/// column order whatever order the file's header uses.
pub struct CsvRowSource {
    path: PathBuf,
    reader: csv::Reader<File>,
    headers: Vec<String>,
    /// `projection[i]` is the file column holding expected column `i`.
    projection: Option<Vec<usize>>,
    record: csv::StringRecord,
    position: u64,
    finished: bool,
}

impl CsvRowSource {
    /// Open a comma-separated `path` and read its header row.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_delimiter(path, b',')
    }

    /// Open `path` with a custom field separator.
    ///
    /// Rows are read flexibly: a row whose field count differs from the
    /// header is yielded as-is and left to the parser to reject.
    pub fn open_with_delimiter(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| KiwiError::RowRead(format!("{}: {e}", path.display())))?;

        let headers = reader
            .headers()
            .map_err(|e| KiwiError::RowRead(format!("{}: header: {e}", path.display())))?
            .iter()
            .map(str::to_string)
            .collect();

        Ok(Self {
            path,
            reader,
            headers,
            projection: None,
            record: csv::StringRecord::new(),
            position: 0,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reorder future rows into `expected` column order.
    ///
    /// The header must validate against `expected`. Duplicate column names
    /// are matched by occurrence.
    pub fn align_to(&mut self, expected: &[&str]) -> Result<()> {
        if !self.validate_schema(expected) {
            return Err(KiwiError::SchemaMismatch {
                symbol: self.path.display().to_string(),
                found: self.headers.clone(),
            });
        }

        let mut taken = vec![false; self.headers.len()];
        let mut projection = Vec::with_capacity(expected.len());
        for col in expected {
            let idx = (0..self.headers.len())
                .find(|&i| !taken[i] && self.headers[i] == *col)
                .ok_or_else(|| KiwiError::SchemaMismatch {
                    symbol: self.path.display().to_string(),
                    found: self.headers.clone(),
                })?;
            taken[idx] = true;
            projection.push(idx);
        }

        self.projection = Some(projection);
        Ok(())
    }
}

impl RowSource for CsvRowSource {
    fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        if self.finished {
            return Err(KiwiError::RowRead(format!("{}: already reached end of stream", self.path.display())));
        }

        let more = self
            .reader
            .read_record(&mut self.record)
            .map_err(|e| KiwiError::RowRead(format!("{}: {e}", self.path.display())))?;
        if !more {
            self.finished = true;
            return Ok(None);
        }

        self.position += 1;
        let row = match &self.projection {
            Some(proj) if self.record.len() == self.headers.len() => {
                proj.iter().map(|&i| self.record[i].to_string()).collect()
            }
            // Ragged rows are not projected.
            _ => self.record.iter().map(str::to_string).collect(),
        };
        Ok(Some(row))
    }

    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use kiwi_core::types::EXPECTED_COLUMNS;

    use super::*;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn yields_rows_in_order_then_end_of_stream() {
        let file = csv_file("Date,Close/Last,Volume,Open,High,Low\n1,101,500,100,102,99\n2,102.5,600,101,103,100.5\n");
        let mut src = CsvRowSource::open(file.path()).unwrap();

        assert!(src.validate_schema(&EXPECTED_COLUMNS));
        assert_eq!(src.next_row().unwrap().unwrap(), ["1", "101", "500", "100", "102", "99"]);
        assert_eq!(src.next_row().unwrap().unwrap()[0], "2");
        assert_eq!(src.position(), 2);
        assert_eq!(src.next_row().unwrap(), None);
    }

    #[test]
    fn reading_past_end_of_stream_is_an_error() {
        let file = csv_file("Date,Close/Last,Volume,Open,High,Low\n");
        let mut src = CsvRowSource::open(file.path()).unwrap();

        assert_eq!(src.next_row().unwrap(), None);
        assert!(matches!(src.next_row(), Err(KiwiError::RowRead(_))));
    }

    #[test]
    fn align_reorders_permuted_header() {
        let file = csv_file("Low,High,Open,Volume,Close/Last,Date\n99,102,100,500,101,1\n");
        let mut src = CsvRowSource::open(file.path()).unwrap();
        src.align_to(&EXPECTED_COLUMNS).unwrap();

        assert_eq!(src.next_row().unwrap().unwrap(), ["1", "101", "500", "100", "102", "99"]);
    }

    #[test]
    fn align_rejects_wrong_header() {
        let file = csv_file("Date,Close,Volume,Open,High,Low\n1,2,3,4,5,6\n");
        let mut src = CsvRowSource::open(file.path()).unwrap();

        assert!(!src.validate_schema(&EXPECTED_COLUMNS));
        assert!(matches!(src.align_to(&EXPECTED_COLUMNS), Err(KiwiError::SchemaMismatch { .. })));
    }

    #[test]
    fn ragged_rows_are_yielded_unprojected() {
        let file = csv_file("Low,High,Open,Volume,Close/Last,Date\n1,2,3\n1,2,3,4,5,6,7\n99,102,100,500,101,1\n");
        let mut src = CsvRowSource::open(file.path()).unwrap();
        src.align_to(&EXPECTED_COLUMNS).unwrap();

        assert_eq!(src.next_row().unwrap().unwrap(), ["1", "2", "3"]);
        assert_eq!(src.next_row().unwrap().unwrap().len(), 7);
        assert_eq!(src.next_row().unwrap().unwrap(), ["1", "101", "500", "100", "102", "99"]);
        assert_eq!(src.position(), 3);
    }

    #[test]
    fn custom_delimiter() {
        let file = csv_file("Date;Close/Last;Volume;Open;High;Low\n1;101;500;100;102;99\n");
        let mut src = CsvRowSource::open_with_delimiter(file.path(), b';').unwrap();

        assert!(src.validate_schema(&EXPECTED_COLUMNS));
        src.align_to(&EXPECTED_COLUMNS).unwrap();
        assert_eq!(src.next_row().unwrap().unwrap(), ["1", "101", "500", "100", "102", "99"]);
    }

    #[test]
    fn missing_file_fails_to_open() {
        assert!(matches!(CsvRowSource::open("/nonexistent/AAPL.csv"), Err(KiwiError::RowRead(_))));
    }
}
