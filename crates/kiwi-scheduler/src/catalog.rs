//! Data directory discovery and per-symbol source loading.
//!
//! Every `<SYMBOL>.csv` in the data directory is a candidate. A candidate
//! whose file cannot be opened or whose header fails validation is skipped
//! with a warning; only an unusable directory is fatal.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use kiwi_core::error::{KiwiError, Result};
use kiwi_core::types::{EXPECTED_COLUMNS, is_valid_symbol};
use tracing::{info, warn};

use crate::engine::SymbolWorker;
use crate::row_source::{CsvRowSource, RowSource};

/// A validated data directory and the symbols found in it.
#[derive(Debug, Clone)]
pub struct SymbolCatalog {
    dir: PathBuf,
    /// Symbol → the row file it was discovered from, in symbol order.
    files: BTreeMap<String, PathBuf>,
    delimiter: u8,
}

impl SymbolCatalog {
    /// Check that `dir` is a readable directory and collect its symbols.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let meta = std::fs::metadata(&dir)
            .map_err(|e| KiwiError::DataDir(format!("{}: {e}", dir.display())))?;
        if !meta.is_dir() {
            return Err(KiwiError::DataDir(format!("{} is not a directory", dir.display())));
        }

        let files = collect_files(&dir)?;
        Ok(Self { dir, files, delimiter: b',' })
    }

    /// Field separator used when opening row files.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Discovered symbols, sorted, each once.
    pub fn symbols(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    /// The row file a symbol was discovered from.
    pub fn symbol_path(&self, symbol: &str) -> Option<&Path> {
        self.files.get(symbol).map(PathBuf::as_path)
    }

    /// Open, validate and align a row source for every symbol.
    ///
    /// Symbols that fail are logged and left out.
    pub fn load_workers(&self) -> Vec<SymbolWorker> {
        let mut workers = Vec::with_capacity(self.files.len());

        for (symbol, path) in &self.files {
            match open_source(path, symbol, self.delimiter) {
                Ok(source) => workers.push(SymbolWorker::new(symbol.clone(), Box::new(source))),
                Err(e) => warn!("[{symbol}] excluded from schedule: {e}"),
            }
        }

        info!(
            "{} of {} symbol(s) scheduled from {}",
            workers.len(),
            self.files.len(),
            self.dir.display()
        );
        workers
    }
}

fn collect_files(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| KiwiError::DataDir(format!("{}: {e}", dir.display())))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| KiwiError::DataDir(format!("{}: {e}", dir.display())))?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }

        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv {
            candidates.push(path);
        }
    }
    candidates.sort();

    let mut files = BTreeMap::new();
    for path in candidates {
        let sym = match path.file_stem().and_then(|s| s.to_str()) {
            Some(sym) if is_valid_symbol(sym) => sym.to_string(),
            Some(sym) => {
                warn!("skipping {sym:?}: not a valid symbol");
                continue;
            }
            None => continue,
        };

        match files.entry(sym) {
            Entry::Vacant(slot) => {
                slot.insert(path);
            }
            Entry::Occupied(mut slot) => {
                // Exact lowercase `.csv` wins; otherwise the first in path order.
                let keep_new = has_plain_extension(&path) && !has_plain_extension(slot.get());
                let (kept, ignored) = if keep_new { (path.clone(), slot.get().clone()) } else { (slot.get().clone(), path) };
                warn!(
                    "[{}] several row files, using {} and ignoring {}",
                    slot.key(),
                    kept.display(),
                    ignored.display()
                );
                slot.insert(kept);
            }
        }
    }

    Ok(files)
}

fn has_plain_extension(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "csv")
}

fn open_source(path: &Path, symbol: &str, delimiter: u8) -> Result<CsvRowSource> {
    let mut source = CsvRowSource::open_with_delimiter(path, delimiter)?;
    if !source.validate_schema(&EXPECTED_COLUMNS) {
        return Err(KiwiError::SchemaMismatch {
            symbol: symbol.to_string(),
            found: source.headers().to_vec(),
        });
    }
    source.align_to(&EXPECTED_COLUMNS)?;
    Ok(source)
}
