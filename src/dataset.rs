use crate::config::{COLUMN_DENSITY, COLUMN_HARDNESS, COLUMN_MINERAL, RARE_EARTH_SYMBOL};
use crate::content::parse_number;
use crate::errors::ConfigError;
use crate::models::MineralRecord;
use crate::periodic::dataset_headers;
use csv::{Reader, StringRecord, Writer};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct WriteSummary {
    pub rows: usize,
    /// Minerals whose rare-earth aggregate was left out of the dataset
    pub rare_earth: Vec<String>,
    /// Symbols found on records but absent from the reference table
    pub unknown_elements: BTreeSet<String>,
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes one row per record, in the order given. Element cells use two decimals.
// TODO: split the RE aggregate into individual lanthanides once a conversion rule exists
pub fn write_dataset(
    path: &Path,
    records: &[MineralRecord],
    symbols: &[String],
) -> Result<WriteSummary, ConfigError> {
    let file = File::create(path).map_err(|source| ConfigError::OutputUnwritable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = Writer::from_writer(BufWriter::with_capacity(128 * 1024, file));
    let write_err = |source: csv::Error| ConfigError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let headers = dataset_headers(symbols);
    writer.write_record(&headers).map_err(write_err)?;

    let columns: FxHashMap<&str, usize> = symbols
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i + 3))
        .collect();

    let mut summary = WriteSummary::default();
    for record in records {
        let mut row = vec![String::new(); headers.len()];
        row[0] = record.name.clone();
        row[1] = format_optional(record.density);
        row[2] = format_optional(record.hardness);

        if record.has_element(RARE_EARTH_SYMBOL) {
            summary.rare_earth.push(record.name.clone());
        }
        for (symbol, percent) in &record.elements {
            if symbol == RARE_EARTH_SYMBOL {
                continue;
            }
            match columns.get(symbol.as_str()) {
                Some(&col) => row[col] = format!("{:.2}", percent),
                None => {
                    warn!(mineral = %record.name, symbol = %symbol, "Element not in reference table, dropped");
                    summary.unknown_elements.insert(symbol.clone());
                }
            }
        }

        writer.write_record(&row).map_err(write_err)?;
        summary.rows += 1;
    }

    writer
        .flush()
        .map_err(|source| ConfigError::OutputUnwritable {
            path: path.to_path_buf(),
            source,
        })?;

    info!(
        path = %path.display(),
        rows = summary.rows,
        rare_earth = summary.rare_earth.len(),
        "Dataset written"
    );
    Ok(summary)
}

/// Reads a dataset or overlay file. Columns are matched by header name; every
/// column other than the three property columns is an element symbol.
pub fn read_dataset(path: &Path) -> Result<Vec<MineralRecord>, ConfigError> {
    let unreadable = |source: csv::Error| ConfigError::DatasetUnreadable {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path)
        .map_err(csv::Error::from)
        .map_err(unreadable)?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    let headers = reader.headers().map_err(unreadable)?.clone();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let name_col = position(COLUMN_MINERAL).ok_or_else(|| ConfigError::MalformedDataset {
        path: path.to_path_buf(),
        line: 1,
        column: COLUMN_MINERAL.to_string(),
        value: "missing column".to_string(),
    })?;
    let density_col = position(COLUMN_DENSITY);
    let hardness_col = position(COLUMN_HARDNESS);

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(unreadable)?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let name = row.get(name_col).unwrap_or_default().trim();
        if name.is_empty() {
            continue;
        }

        let mut record = MineralRecord::new(name);
        for (col, header) in headers.iter().enumerate() {
            if col == name_col {
                continue;
            }
            let Some(value) = cell(&row, col, header, path, line)? else {
                continue;
            };
            if Some(col) == density_col {
                record.density = Some(value);
            } else if Some(col) == hardness_col {
                record.hardness = Some(value);
            } else {
                record.add_element(header.trim(), value);
            }
        }
        records.push(record);
    }

    info!(path = %path.display(), records = records.len(), "Dataset read");
    Ok(records)
}

/// Numeric cell value; `None` for an empty or missing cell.
fn cell(
    row: &StringRecord,
    col: usize,
    header: &str,
    path: &Path,
    line: u64,
) -> Result<Option<f64>, ConfigError> {
    let raw = row.get(col).unwrap_or_default().trim();
    if raw.is_empty() {
        return Ok(None);
    }
    parse_number(raw)
        .map(Some)
        .ok_or_else(|| ConfigError::MalformedDataset {
            path: path.to_path_buf(),
            line,
            column: header.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn symbols() -> Vec<String> {
        ["H", "O", "Si", "Ca", "C"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn quartz() -> MineralRecord {
        let mut record = MineralRecord::new("Quartz");
        record.density = Some(2.65);
        record.hardness = Some(7.0);
        record.add_element("Si", 46.74);
        record.add_element("O", 53.26);
        record
    }

    #[test]
    fn writes_header_and_formatted_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("minerals.csv");

        let summary = write_dataset(&path, &[quartz()], &symbols()).unwrap();
        assert_eq!(summary.rows, 1);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Mineral,Density,Hardness,H,O,Si,Ca,C");
        assert_eq!(lines[1], "Quartz,2.65,7,,53.26,46.74,,");
    }

    #[test]
    fn absent_values_are_empty_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("minerals.csv");

        write_dataset(&path, &[MineralRecord::new("Opal")], &symbols()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().nth(1).unwrap(), "Opal,,,,,,,");
    }

    #[test]
    fn percentages_rounded_to_two_decimals() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("minerals.csv");
        let mut calcite = MineralRecord::new("Calcite");
        calcite.add_element("Ca", 40.0432);
        calcite.add_element("C", 12.0);

        write_dataset(&path, &[calcite], &symbols()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().nth(1).unwrap(), "Calcite,,,,,,40.04,12.00");
    }

    #[test]
    fn rare_earth_column_is_dropped_and_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("minerals.csv");
        let mut monazite = MineralRecord::new("Monazite");
        monazite.add_element("RE", 55.0);
        monazite.add_element("O", 27.0);
        monazite.add_element("Xx", 1.0);

        let summary = write_dataset(&path, &[monazite], &symbols()).unwrap();
        assert_eq!(summary.rare_earth, vec!["Monazite"]);
        assert!(summary.unknown_elements.contains("Xx"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("RE"));
        assert!(!content.contains("55"));
        assert_eq!(content.lines().nth(1).unwrap(), "Monazite,,,,27.00,,,");
    }

    #[test]
    fn unwritable_output_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no").join("such").join("dir.csv");
        assert!(matches!(
            write_dataset(&path, &[], &symbols()),
            Err(ConfigError::OutputUnwritable { .. })
        ));
    }

    #[test]
    fn read_back_written_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("minerals.csv");
        write_dataset(&path, &[quartz(), MineralRecord::new("Opal")], &symbols()).unwrap();

        let records = read_dataset(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Quartz");
        assert_eq!(records[0].density, Some(2.65));
        assert_eq!(records[0].hardness, Some(7.0));
        assert_eq!(records[0].elements["Si"], 46.74);
        assert_eq!(records[0].elements.len(), 2);
        assert!(records[1].density.is_none());
        assert!(records[1].elements.is_empty());
    }

    #[test]
    fn read_rejects_non_numeric_cell() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.csv");
        fs::write(&path, "Mineral,Density,Hardness,O\nQuartz,heavy,7,53.26\n").unwrap();

        match read_dataset(&path).unwrap_err() {
            ConfigError::MalformedDataset { line, column, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, "Density");
                assert_eq!(value, "heavy");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn read_requires_mineral_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.csv");
        fs::write(&path, "Name,Density\nQuartz,2.65\n").unwrap();
        assert!(matches!(
            read_dataset(&path),
            Err(ConfigError::MalformedDataset { line: 1, .. })
        ));
    }

    #[test]
    fn read_missing_file_is_error() {
        assert!(matches!(
            read_dataset(Path::new("/nonexistent/custom.csv")),
            Err(ConfigError::DatasetUnreadable { .. })
        ));
    }
}
