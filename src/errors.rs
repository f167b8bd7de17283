use std::path::PathBuf;
use thiserror::Error;

/// Problems that make a run meaningless. The caller aborts before writing any output.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Reference table not found: {path}")]
    MissingReferenceTable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed reference table {path} at line {line}: {reason}")]
    MalformedReferenceTable {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("Unsupported fetcher: {0} (expected \"http\" or \"file\")")]
    UnsupportedFetcher(String),

    #[error("Fetcher could not be initialized: {0}")]
    FetcherInit(String),

    #[error("Invalid pattern '{name}'")]
    InvalidPattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid selector '{name}': {selector}")]
    InvalidSelector { name: &'static str, selector: String },

    #[error("Invalid reference URL '{name}': {url}")]
    InvalidUrl { name: &'static str, url: String },

    #[error("Failed to read site profile: {path}")]
    ProfileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid site profile: {path}")]
    InvalidProfile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Batch count must be at least 1")]
    InvalidBatchCount,

    #[error("Failed to start worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Positional selector template must contain {{i}}: {0}")]
    InvalidTemplate(String),

    #[error("Cannot open output for writing: {path}")]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write dataset: {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Cannot read dataset: {path}")]
    DatasetUnreadable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed dataset {path} at line {line}, column '{column}': {value:?}")]
    MalformedDataset {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },
}

/// Failure to obtain a single page. Always local to the URL being fetched.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Timed out after {seconds}s fetching {url}")]
    Timeout { url: String, seconds: u64 },

    #[error("HTTP request failed for {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Fetcher could not be initialized: {0}")]
    Init(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

impl From<FetchError> for ConfigError {
    fn from(err: FetchError) -> Self {
        ConfigError::FetcherInit(err.to_string())
    }
}
