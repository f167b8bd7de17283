//! Tests for patching a written dataset with a hand-edited overlay CSV.
//!
//! This module validates the path the `overlay` command takes: read the
//! dataset with `dataset::read_dataset()`, read the overlay file the same way,
//! apply `merge::overlay()` and write the result back with `dataset::write_dataset()`.
//!
//! # Overlay Strategy
//!
//! - A row whose mineral name already exists replaces the whole record. Empty
//!   cells in the overlay stay empty; nothing is carried over from the dataset
//! - A row with a new name is appended
//! - Output is sorted by name with ordinal comparison
//!
//! # Test Fixtures
//!
//! `write_csv()` drops a CSV with the given header and rows into a TempDir.
//! Overlay files only need the columns they use; missing element columns read
//! as absent.

use anyhow::Result;
use mineralis::dataset::{read_dataset, write_dataset};
use mineralis::errors::ConfigError;
use mineralis::merge;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to write a CSV file with the given header and rows.
fn write_csv(dir: &Path, name: &str, header: &str, rows: &[&str]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut file = File::create(&path)?;
    writeln!(file, "{}", header)?;
    for row in rows {
        writeln!(file, "{}", row)?;
    }
    Ok(path)
}

fn symbols() -> Vec<String> {
    ["O", "Si", "Fe"].iter().map(|s| s.to_string()).collect()
}

/// Reads, overlays and writes, the way `mineralis overlay` does.
fn apply(dataset: &Path, custom: &Path, output: &Path) -> Result<merge::OverlayOutcome> {
    let baseline = read_dataset(dataset)?;
    let overlays = read_dataset(custom)?;
    let outcome = merge::overlay(baseline, overlays);
    write_dataset(output, &outcome.merged, &symbols())?;
    Ok(outcome)
}

#[test]
fn test_overlay_replaces_record_without_merging_fields() -> Result<()> {
    let temp = TempDir::new()?;
    let dataset = write_csv(
        temp.path(),
        "Minerals.csv",
        "Mineral,Density,Hardness,O,Si,Fe",
        &["X,3,5,,,10.00", "Y,1,,,,"],
    )?;
    let custom = write_csv(temp.path(), "Custom.csv", "Mineral,Density,Hardness", &["X,4,"])?;
    let output = temp.path().join("CurrentMinerals.csv");

    let outcome = apply(&dataset, &custom, &output)?;
    assert_eq!(outcome.modified.len(), 1);
    assert_eq!(outcome.modified[0].hardness, Some(5.0));
    assert!(outcome.added.is_empty());

    let content = fs::read_to_string(&output)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "Mineral,Density,Hardness,O,Si,Fe");
    assert_eq!(lines[1], "X,4,,,,");
    assert_eq!(lines[2], "Y,1,,,,");

    let records = read_dataset(&output)?;
    assert_eq!(records[0].density, Some(4.0));
    assert_eq!(records[0].hardness, None);
    assert!(records[0].elements.is_empty());

    Ok(())
}

#[test]
fn test_overlay_adds_new_minerals_in_sorted_position() -> Result<()> {
    let temp = TempDir::new()?;
    let dataset = write_csv(
        temp.path(),
        "Minerals.csv",
        "Mineral,Density,Hardness,O,Si,Fe",
        &["Hematite,5.3,6,30.06,,69.94", "Quartz,2.65,7,53.26,46.74,"],
    )?;
    let custom = write_csv(
        temp.path(),
        "Custom.csv",
        "Mineral,Density,Hardness,O,Si",
        &["Opal,2.09,5.75,60.0,40.0", "Zircon,4.65,7.5,,"],
    )?;
    let output = temp.path().join("CurrentMinerals.csv");

    let outcome = apply(&dataset, &custom, &output)?;
    let added: Vec<&str> = outcome.added.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(added, vec!["Opal", "Zircon"]);
    assert!(outcome.modified.is_empty());

    let names: Vec<String> = read_dataset(&output)?
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Hematite", "Opal", "Quartz", "Zircon"]);

    let content = fs::read_to_string(&output)?;
    assert!(content.contains("Opal,2.09,5.75,60.00,40.00,"));

    Ok(())
}

#[test]
fn test_overlay_sort_is_ordinal() -> Result<()> {
    let temp = TempDir::new()?;
    let dataset = write_csv(
        temp.path(),
        "Minerals.csv",
        "Mineral,Density,Hardness",
        &["albite,,", "Zircon,,"],
    )?;
    let custom = write_csv(
        temp.path(),
        "Custom.csv",
        "Mineral,Density,Hardness",
        &["Beryl,2.76,7.75"],
    )?;
    let output = temp.path().join("CurrentMinerals.csv");

    apply(&dataset, &custom, &output)?;
    let names: Vec<String> = read_dataset(&output)?
        .into_iter()
        .map(|r| r.name)
        .collect();
    // uppercase sorts before lowercase
    assert_eq!(names, vec!["Beryl", "Zircon", "albite"]);

    Ok(())
}

#[test]
fn test_malformed_overlay_aborts_before_writing() -> Result<()> {
    let temp = TempDir::new()?;
    let dataset = write_csv(
        temp.path(),
        "Minerals.csv",
        "Mineral,Density,Hardness",
        &["Quartz,2.65,7"],
    )?;
    let custom = write_csv(
        temp.path(),
        "Custom.csv",
        "Mineral,Density,Hardness",
        &["Opal,light,6"],
    )?;
    let output = temp.path().join("CurrentMinerals.csv");

    let err = apply(&dataset, &custom, &output).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::MalformedDataset { .. })
    ));
    assert!(!output.exists());

    Ok(())
}

#[test]
fn test_empty_overlay_rewrites_dataset_unchanged() -> Result<()> {
    let temp = TempDir::new()?;
    let dataset = write_csv(
        temp.path(),
        "Minerals.csv",
        "Mineral,Density,Hardness,O,Si,Fe",
        &["Quartz,2.65,7,53.26,46.74,"],
    )?;
    let custom = write_csv(temp.path(), "Custom.csv", "Mineral,Density,Hardness", &[])?;
    let output = temp.path().join("CurrentMinerals.csv");

    let outcome = apply(&dataset, &custom, &output)?;
    assert!(outcome.added.is_empty());
    assert!(outcome.modified.is_empty());
    assert_eq!(fs::read_to_string(&dataset)?, fs::read_to_string(&output)?);

    Ok(())
}
