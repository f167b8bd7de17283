//! Mineralis: mineral property harvester
//!
//! This crate builds a tabular dataset of minerals (density, hardness and
//! element composition by weight) from a mineralogy reference website:
//!
//! 1. **Reference Pass** -- Load the ordered list of element symbols from a
//!    periodic table CSV; these become the dataset's element columns
//! 2. **Discovery Pass** -- Walk the site index and collect detail-page URLs,
//!    either by polling positional selectors or by enumerating table rows
//! 3. **Harvest Pass** -- Split the URLs into N contiguous batches and parse
//!    each batch on its own worker with its own page fetcher
//! 4. **Reconcile Pass** -- Deduplicate by mineral name and sort
//! 5. **Write Pass** -- Emit the dataset CSV plus side reports for skipped
//!    links, rare-earth minerals and the run itself
//!
//! A separate overlay command patches a previously written dataset with a
//! hand-edited CSV, replacing whole records by name.
//!
//! # Architecture
//!
//! - **Per-worker fetchers** -- Fetchers are built inside each worker and never shared
//! - **Batch hand-off** -- Workers collect locally, lock the shared results once per batch
//! - **Separate status lock** -- Progress output never waits on a result hand-off
//! - **Explicit state machine** -- The composition table is walked row by row with
//!   a named state per field instead of flags
//! - **Atomic operations** -- Lock-free counters for harvest statistics
//! - **Site profiles** -- Selectors, patterns and URLs live in a TOML profile with
//!   built-in defaults for webmineral.com
//!
//! # Key Modules
//!
//! - [`periodic`] -- Periodic table loader
//! - [`fetch`] -- `PageFetcher` trait with HTTP and offline mirror adapters
//! - [`parser`] -- Detail-page parser producing `MineralRecord`s
//! - [`index`] -- Link discovery over the site index
//! - [`extract`] -- Concurrent batch harvester
//! - [`merge`] -- Deduplication and overlay
//! - [`dataset`] -- Dataset CSV writer and reader
//! - [`report`] -- Skipped-link, rare-earth and JSON run reports
//! - [`content`] -- Text and number helpers
//! - [`models`] -- Core data types (MineralRecord)
//! - [`stats`] -- Thread-safe atomic counters for harvest metrics
//! - [`config`] -- Constants and site profile
//! - [`errors`] -- Fatal configuration errors and per-page fetch errors
//!
//! # Example Usage
//!
//! ```bash
//! # Harvest with 8 workers
//! mineralis harvest --periodic-table PeriodicTable.csv -o Minerals.csv --workers 8
//!
//! # Check a profile against the index without harvesting
//! mineralis links --profile site.toml
//!
//! # Patch the dataset with hand-corrected records
//! mineralis overlay --dataset Minerals.csv --custom Custom.csv \
//!     --periodic-table PeriodicTable.csv -o CurrentMinerals.csv
//! ```

pub mod config;
pub mod content;
pub mod dataset;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod index;
pub mod merge;
pub mod models;
pub mod parser;
pub mod periodic;
pub mod report;
pub mod stats;
