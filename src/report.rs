use crate::config::{RARE_EARTH_REPORT, RUN_REPORT, SKIPPED_REPORT};
use crate::errors::ConfigError;
use crate::extract::FailedWorker;
use crate::merge::OverlayOutcome;
use crate::models::MineralRecord;
use crate::stats::StatsSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Summary of one harvest run, written as `report.json`.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub links_discovered: usize,
    pub records_harvested: usize,
    pub unique_minerals: usize,
    pub skipped: Vec<String>,
    pub duplicates: Vec<String>,
    pub rare_earth: Vec<String>,
    pub unknown_elements: Vec<String>,
    pub failed_workers: Vec<FailedWorker>,
    pub duration_secs: f64,
    pub stats: StatsSnapshot,
}

/// Side reports live in the same directory as the dataset.
pub fn report_dir(dataset: &Path) -> PathBuf {
    dataset.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn create(path: &Path) -> Result<BufWriter<File>, ConfigError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| ConfigError::OutputUnwritable {
            path: path.to_path_buf(),
            source,
        })
}

fn write_lines<'a, I>(path: &Path, lines: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut writer = create(path)?;
    let result: io::Result<()> = lines
        .into_iter()
        .try_for_each(|line| writeln!(writer, "{}", line))
        .and_then(|_| writer.flush());
    result.map_err(|source| ConfigError::OutputUnwritable {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes every skipped link, sorted, one per line.
pub fn write_skipped(dir: &Path, skipped: &[String]) -> Result<PathBuf, ConfigError> {
    let mut sorted: Vec<&str> = skipped.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let path = dir.join(SKIPPED_REPORT);
    write_lines(&path, sorted)?;
    info!(path = %path.display(), links = skipped.len(), "Skipped links written");
    Ok(path)
}

/// Writes the names of minerals whose rare-earth share was left out of the dataset.
pub fn write_rare_earth(dir: &Path, names: &[String]) -> Result<PathBuf, ConfigError> {
    let path = dir.join(RARE_EARTH_REPORT);
    write_lines(&path, names.iter().map(String::as_str))?;
    info!(path = %path.display(), minerals = names.len(), "Rare-earth report written");
    Ok(path)
}

pub fn write_run_report(dir: &Path, report: &RunReport) -> Result<PathBuf, ConfigError> {
    let path = dir.join(RUN_REPORT);
    let mut writer = create(&path)?;
    serde_json::to_writer_pretty(&mut writer, report)
        .map_err(io::Error::from)
        .and_then(|_| writer.flush())
        .map_err(|source| ConfigError::OutputUnwritable {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

fn describe(record: &MineralRecord) -> String {
    let density = record
        .density
        .map_or_else(|| "-".to_string(), |d| d.to_string());
    let hardness = record
        .hardness
        .map_or_else(|| "-".to_string(), |h| h.to_string());
    format!(
        "{} (density {}, hardness {}, {} elements)",
        record.name,
        density,
        hardness,
        record.elements.len()
    )
}

/// Logs each group of records that shared a name. Returns the repeated names.
pub fn log_duplicates(duplicates: &BTreeMap<String, Vec<MineralRecord>>) -> Vec<String> {
    for (name, group) in duplicates {
        warn!(name = %name, copies = group.len(), "Duplicate mineral");
        for record in group {
            info!("  {}", describe(record));
        }
    }
    duplicates.keys().cloned().collect()
}

/// Logs every record the overlay touched. Returns one line per change for the
/// run summary, additions first.
pub fn log_overlay(outcome: &OverlayOutcome) -> Vec<String> {
    let mut changes = Vec::with_capacity(outcome.added.len() + outcome.modified.len());
    for record in &outcome.added {
        info!("Added {}", describe(record));
        changes.push(format!("added    {}", record.name));
    }
    for record in &outcome.modified {
        info!("Replaced {}", describe(record));
        changes.push(format!("replaced {}", record.name));
    }
    changes
}
