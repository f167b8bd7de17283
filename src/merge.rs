use crate::models::{sort_by_name, MineralRecord};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Unique records plus every name that appeared more than once.
#[derive(Debug, Default)]
pub struct Deduplicated {
    pub unique: Vec<MineralRecord>,
    /// Diagnostic only: every instance seen for each repeated name
    pub duplicates: BTreeMap<String, Vec<MineralRecord>>,
}

#[derive(Debug, Default)]
pub struct OverlayOutcome {
    pub merged: Vec<MineralRecord>,
    /// Overlay records whose name was new
    pub added: Vec<MineralRecord>,
    /// Baseline records that an overlay record replaced
    pub modified: Vec<MineralRecord>,
}

/// Collapses records sharing a name. The first occurrence survives; output is sorted by name.
pub fn deduplicate(records: Vec<MineralRecord>) -> Deduplicated {
    let mut groups: FxHashMap<String, Vec<MineralRecord>> = FxHashMap::default();
    for record in &records {
        groups
            .entry(record.name.clone())
            .or_default()
            .push(record.clone());
    }
    let duplicates: BTreeMap<String, Vec<MineralRecord>> = groups
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .collect();

    let mut seen = FxHashSet::default();
    let mut unique: Vec<MineralRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.name.clone()))
        .collect();
    sort_by_name(&mut unique);

    info!(
        unique = unique.len(),
        duplicate_names = duplicates.len(),
        "Deduplication complete"
    );

    Deduplicated { unique, duplicates }
}

/// Lays `overlays` over `baseline`. A matching name replaces the whole baseline
/// record; no field from the baseline survives.
pub fn overlay(baseline: Vec<MineralRecord>, overlays: Vec<MineralRecord>) -> OverlayOutcome {
    let mut merged: Vec<MineralRecord> = baseline;
    let mut added = Vec::new();
    let mut modified = Vec::new();

    for record in overlays {
        match merged.iter().position(|m| m.name == record.name) {
            Some(index) => {
                debug!(name = %record.name, "Overlay replaces record");
                modified.push(merged.remove(index));
            }
            None => {
                debug!(name = %record.name, "Overlay adds record");
                added.push(record.clone());
            }
        }
        merged.push(record);
    }

    sort_by_name(&mut merged);
    sort_by_name(&mut added);
    sort_by_name(&mut modified);

    info!(
        total = merged.len(),
        added = added.len(),
        modified = modified.len(),
        "Overlay applied"
    );

    OverlayOutcome {
        merged,
        added,
        modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, density: Option<f64>, hardness: Option<f64>) -> MineralRecord {
        MineralRecord {
            name: name.to_string(),
            density,
            hardness,
            ..MineralRecord::default()
        }
    }

    fn names(records: &[MineralRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn dedup_reports_groups_and_keeps_first() {
        let records = vec![
            record("Calcite", Some(2.71), None),
            record("Quartz", Some(2.65), Some(7.0)),
            record("Calcite", Some(2.95), None),
        ];
        let result = deduplicate(records);

        assert_eq!(names(&result.unique), vec!["Calcite", "Quartz"]);
        assert_eq!(result.unique[0].density, Some(2.71));
        assert_eq!(result.duplicates.len(), 1);
        assert_eq!(result.duplicates["Calcite"].len(), 2);
        assert_eq!(result.duplicates["Calcite"][1].density, Some(2.95));
    }

    #[test]
    fn dedup_keeps_every_name() {
        let input = vec![
            record("b", None, None),
            record("a", None, None),
            record("b", None, None),
            record("c", None, None),
            record("a", None, None),
            record("B", None, None),
        ];
        let mut expected: Vec<String> = input.iter().map(|r| r.name.clone()).collect();
        expected.sort();
        expected.dedup();

        let result = deduplicate(input);
        let got: Vec<String> = result.unique.iter().map(|r| r.name.clone()).collect();
        assert_eq!(got, expected);
        assert_eq!(result.duplicates.len(), 2);
    }

    #[test]
    fn dedup_empty() {
        let result = deduplicate(Vec::new());
        assert!(result.unique.is_empty());
        assert!(result.duplicates.is_empty());
    }

    #[test]
    fn overlay_replaces_whole_record() {
        let mut baseline_x = record("X", Some(3.0), Some(5.0));
        baseline_x.add_element("Fe", 10.0);
        let baseline = vec![baseline_x, record("Y", Some(1.0), None)];
        let overlays = vec![record("X", Some(4.0), None)];

        let outcome = overlay(baseline, overlays);
        let x = outcome.merged.iter().find(|r| r.name == "X").unwrap();
        assert_eq!(x.density, Some(4.0));
        assert_eq!(x.hardness, None);
        assert!(x.elements.is_empty());

        assert_eq!(names(&outcome.modified), vec!["X"]);
        assert_eq!(outcome.modified[0].hardness, Some(5.0));
        assert!(outcome.added.is_empty());
        assert_eq!(names(&outcome.merged), vec!["X", "Y"]);
    }

    #[test]
    fn overlay_adds_new_names() {
        let baseline = vec![record("Quartz", Some(2.65), Some(7.0))];
        let overlays = vec![
            record("Zircon", Some(4.65), Some(7.5)),
            record("Apatite", None, Some(5.0)),
        ];

        let outcome = overlay(baseline, overlays);
        assert_eq!(names(&outcome.merged), vec!["Apatite", "Quartz", "Zircon"]);
        assert_eq!(names(&outcome.added), vec!["Apatite", "Zircon"]);
        assert!(outcome.modified.is_empty());
    }

    #[test]
    fn overlay_matches_first_baseline_entry() {
        let baseline = vec![record("Albite", Some(2.6), None), record("Quartz", Some(2.65), None)];
        let overlays = vec![record("Albite", Some(2.62), None)];

        let outcome = overlay(baseline, overlays);
        assert_eq!(names(&outcome.modified), vec!["Albite"]);
        assert_eq!(outcome.merged.len(), 2);
        assert_eq!(outcome.merged[0].density, Some(2.62));
    }

    #[test]
    fn repeated_overlay_name_replaces_earlier_overlay() {
        let overlays = vec![record("Opal", Some(2.0), None), record("Opal", Some(2.1), None)];
        let outcome = overlay(Vec::new(), overlays);

        assert_eq!(outcome.merged.len(), 1);
        assert_eq!(outcome.merged[0].density, Some(2.1));
        assert_eq!(names(&outcome.added), vec!["Opal"]);
        assert_eq!(outcome.modified[0].density, Some(2.0));
    }
}
