use crate::config::{COLUMN_DENSITY, COLUMN_HARDNESS, COLUMN_MINERAL};
use crate::content::strip_whitespace;
use crate::errors::ConfigError;
use csv::ReaderBuilder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Column of the reference table that holds the element symbol
const SYMBOL_COLUMN: usize = 2;

/// Reads element symbols, in table order, from a periodic table CSV whose
/// first row is a header and whose third column is the symbol. A table with
/// no rows below the header is rejected.
pub fn load_symbols(path: &Path) -> Result<Vec<String>, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::MissingReferenceTable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let malformed = |line: u64, reason: String| ConfigError::MalformedReferenceTable {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut symbols = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or_default();
            malformed(line, e.to_string())
        })?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let raw = row.get(SYMBOL_COLUMN).ok_or_else(|| {
            malformed(line, format!("expected at least 3 columns, found {}", row.len()))
        })?;
        let symbol = strip_whitespace(raw);
        if symbol.is_empty() {
            return Err(malformed(line, "empty element symbol".to_string()));
        }
        symbols.push(symbol);
    }

    if symbols.is_empty() {
        return Err(malformed(1, "no element symbols below the header".to_string()));
    }

    info!(path = %path.display(), elements = symbols.len(), "Loaded periodic table");
    Ok(symbols)
}

/// Full dataset header: the fixed property columns followed by one column per symbol.
pub fn dataset_headers(symbols: &[String]) -> Vec<String> {
    [COLUMN_MINERAL, COLUMN_DENSITY, COLUMN_HARDNESS]
        .iter()
        .map(|c| c.to_string())
        .chain(symbols.iter().cloned())
        .collect()
}
