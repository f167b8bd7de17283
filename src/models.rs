use serde::Serialize;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// A mineral as scraped from its detail page or read back from a dataset.
///
/// `name` is the sole identity key: equality and hashing ignore every other
/// field, so two records with the same name but different properties are
/// duplicates of one another. The dedup and overlay passes depend on this.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MineralRecord {
    pub name: String,
    pub density: Option<f64>,
    /// Ranges such as "5-6" are stored as their mean.
    pub hardness: Option<f64>,
    /// Element symbol to weight percentage.
    pub elements: BTreeMap<String, f64>,
}

impl MineralRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a percentage for `symbol`, summing with any earlier contribution.
    pub fn add_element(&mut self, symbol: &str, percent: f64) {
        *self.elements.entry(symbol.to_string()).or_insert(0.0) += percent;
    }

    pub fn has_element(&self, symbol: &str) -> bool {
        self.elements.contains_key(symbol)
    }
}

impl PartialEq for MineralRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MineralRecord {}

impl Hash for MineralRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A source URL that never became a record.
pub type SkippedLink = String;

/// Sorts records by name using ordinal (byte-wise) comparison.
pub fn sort_by_name(records: &mut [MineralRecord]) {
    records.sort_by(|a, b| a.name.cmp(&b.name));
}
