use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Maximum number of meta-refresh hops followed for a single detail page
pub const REDIRECT_MAX_DEPTH: u32 = 5;

/// Upper bound on index pages visited when following pagination
pub const MAX_INDEX_PAGES: usize = 500;

pub const DEFAULT_WORKERS: usize = 4;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Aggregate rare-earth pseudo-element; never written as a dataset column
pub const RARE_EARTH_SYMBOL: &str = "RE";

pub const COLUMN_MINERAL: &str = "Mineral";
pub const COLUMN_DENSITY: &str = "Density";
pub const COLUMN_HARDNESS: &str = "Hardness";

pub const SKIPPED_REPORT: &str = "skipped.txt";
pub const RARE_EARTH_REPORT: &str = "rare_earth.txt";
pub const RUN_REPORT: &str = "report.json";

/// Progress update interval for link discovery (tick every N positions)
pub const PROGRESS_INTERVAL: u32 = 25;

const DEFAULT_BASE: &str = "http://webmineral.com";

/// Everything site-specific: where to look, what to match.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SiteProfile {
    pub site: SiteConfig,
    pub references: ReferenceUrls,
    pub titles: SectionTitles,
    pub selectors: DetailSelectors,
    pub patterns: PatternConfig,
    pub discovery: DiscoveryStrategy,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub index_url: String,
    /// Substring every accepted detail-page link must contain
    pub detail_suffix: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            index_url: format!("{DEFAULT_BASE}/data/index.html"),
            detail_suffix: ".shtml".to_string(),
        }
    }
}

/// Help-page URLs that the section header links point to; these
/// disambiguate real section rows from incidental text.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReferenceUrls {
    pub elements: String,
    pub density: String,
    pub hardness: String,
}

impl Default for ReferenceUrls {
    fn default() -> Self {
        Self {
            elements: format!("{DEFAULT_BASE}/help/Composition.shtml"),
            density: format!("{DEFAULT_BASE}/help/Density.shtml"),
            hardness: format!("{DEFAULT_BASE}/help/Hardness.shtml"),
        }
    }
}

/// Lower-case keywords a row must contain before its link is inspected
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SectionTitles {
    pub elements: String,
    pub density: String,
    pub hardness: String,
}

impl Default for SectionTitles {
    fn default() -> Self {
        Self {
            elements: "composition".to_string(),
            density: "density".to_string(),
            hardness: "hardness".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetailSelectors {
    pub title: String,
    pub row: String,
    /// Evaluated inside each row
    pub row_link: String,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        let table = "table:nth-of-type(3) > tbody > tr";
        Self {
            title: format!("center > {table}:first-child"),
            row: format!("center > {table}"),
            row_link: "td:first-child a".to_string(),
        }
    }
}

/// Regular expressions applied to title and row text. Capture group 1 holds
/// the value (percentage for `element`, whose group 2 is the symbol).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub name: String,
    pub exclude: String,
    pub element: String,
    pub density: String,
    pub hardness: String,
    pub hardness_separator: String,
    pub elements_sentinel: String,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            name: r"General(.*)Information".to_string(),
            exclude: r"(IMA\S*)".to_string(),
            element: r"(\d+\.?\d*)\s*%\s*(\w+).*".to_string(),
            density: r"(\d+(?:\.\d+)?)".to_string(),
            hardness: r"(\d+\.?\d*\s*-\s*\d+\.?\d*|\d+\.?\d*)".to_string(),
            hardness_separator: "-".to_string(),
            elements_sentinel: "______".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DiscoveryStrategy {
    /// Poll one selector per row position until it stops matching.
    Positional {
        /// Must contain `{i}`, replaced by the row position
        selector_template: String,
        first: u32,
        last: Option<u32>,
    },
    /// Enumerate the index table rows directly.
    Structural {
        row_selector: String,
        link_selector: String,
        next_page_selector: Option<String>,
    },
}

impl Default for DiscoveryStrategy {
    fn default() -> Self {
        DiscoveryStrategy::Positional {
            selector_template: "body > table > tbody > tr:nth-child({i}) > td:nth-child(2) > a"
                .to_string(),
            first: 4,
            last: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// "http" or "file"
    pub kind: String,
    pub timeout_secs: u64,
    pub workers: usize,
    pub user_agent: String,
    /// Root of an offline copy of the site, used by the "file" fetcher
    pub mirror: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            kind: "http".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: DEFAULT_WORKERS,
            user_agent: concat!("mineralis/", env!("CARGO_PKG_VERSION")).to_string(),
            mirror: None,
        }
    }
}

impl SiteProfile {
    /// Reads a TOML profile; any section left out keeps its built-in default.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ProfileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: SiteProfile =
            toml::from_str(&text).map_err(|source| ConfigError::InvalidProfile {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "Loaded site profile");
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.workers == 0 {
            return Err(ConfigError::InvalidBatchCount);
        }
        if let DiscoveryStrategy::Positional {
            selector_template, ..
        } = &self.discovery
        {
            if !selector_template.contains("{i}") {
                return Err(ConfigError::InvalidTemplate(selector_template.clone()));
            }
        }
        for (name, url) in [
            ("index_url", &self.site.index_url),
            ("elements", &self.references.elements),
            ("density", &self.references.density),
            ("hardness", &self.references.hardness),
        ] {
            if url::Url::parse(url).is_err() {
                return Err(ConfigError::InvalidUrl {
                    name,
                    url: url.clone(),
                });
            }
        }
        Ok(())
    }
}
