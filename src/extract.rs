use crate::config::REDIRECT_MAX_DEPTH;
use crate::errors::{ConfigError, FetchError};
use crate::fetch::PageFetcher;
use crate::models::{MineralRecord, SkippedLink};
use crate::parser::{ParseOutcome, RecordParser, SkipReason};
use crate::stats::HarvestStats;
use indicatif::{ProgressBar, ProgressStyle};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::ops::Range;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// A worker that never got a fetcher and contributed nothing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedWorker {
    pub worker: usize,
    pub urls: usize,
    pub message: String,
}

/// Everything the workers handed back, in link order.
#[derive(Debug, Default)]
pub struct Harvest {
    pub records: Vec<MineralRecord>,
    pub skipped: Vec<SkippedLink>,
    pub failed_workers: Vec<FailedWorker>,
}

/// Splits `len` items into `batch_count` contiguous ranges. The first
/// `len % batch_count` ranges are one item longer; a count of zero is treated as one.
pub fn partition(len: usize, batch_count: usize) -> Vec<Range<usize>> {
    let batch_count = batch_count.max(1);
    let base = len / batch_count;
    let remainder = len % batch_count;

    let mut ranges = Vec::with_capacity(batch_count);
    let mut start = 0;
    for i in 0..batch_count {
        let size = base + usize::from(i < remainder);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Result collections shared by all workers, appended to once per batch.
/// Each batch is tagged with its worker so link order can be restored.
#[derive(Default)]
struct Shared {
    records: Mutex<Vec<(usize, Vec<MineralRecord>)>>,
    skipped: Mutex<Vec<(usize, Vec<SkippedLink>)>>,
}

impl Shared {
    fn hand_off(&self, worker: usize, records: Vec<MineralRecord>, skipped: Vec<SkippedLink>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((worker, records));
        self.skipped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((worker, skipped));
    }

    fn into_parts(self) -> (Vec<MineralRecord>, Vec<SkippedLink>) {
        (
            in_link_order(self.records),
            in_link_order(self.skipped),
        )
    }
}

fn in_link_order<T>(batches: Mutex<Vec<(usize, Vec<T>)>>) -> Vec<T> {
    let mut batches = batches.into_inner().unwrap_or_else(PoisonError::into_inner);
    batches.sort_unstable_by_key(|(worker, _)| *worker);
    batches.into_iter().flat_map(|(_, items)| items).collect()
}

struct StatusState {
    bar: ProgressBar,
    failures: Vec<FailedWorker>,
}

/// Per-page console output, serialized on its own lock so it never waits on a batch hand-off.
struct StatusReporter {
    state: Mutex<StatusState>,
}

impl StatusReporter {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        {
            bar.set_style(style);
        }
        Self {
            state: Mutex::new(StatusState {
                bar,
                failures: Vec::new(),
            }),
        }
    }

    fn page_done(&self, name: &str, elapsed: Duration) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let line = format!(
            "Done downloading {} in {:.2} seconds",
            name,
            elapsed.as_secs_f64()
        );
        if state.bar.is_hidden() {
            info!("{}", line);
        } else {
            state.bar.println(line);
        }
        state.bar.inc(1);
    }

    fn page_skipped(&self, url: &str, reason: &SkipReason) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(url = url, reason = %reason, "Skipped page");
        state.bar.inc(1);
    }

    fn redirected(&self, from: &str, to: &str) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = from, to = to, "Following redirect");
        state.bar.inc_length(1);
        state.bar.inc(1);
    }

    fn worker_failed(&self, failure: FailedWorker) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        error!(
            worker = failure.worker,
            urls = failure.urls,
            error = %failure.message,
            "Worker could not start; its batch is lost"
        );
        state.bar.inc(failure.urls as u64);
        state.failures.push(failure);
    }

    fn finish(self) -> Vec<FailedWorker> {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        state.bar.finish_and_clear();
        state.failures
    }
}

/// Harvests `urls` on `batch_count` workers. Each worker builds its own fetcher
/// through `factory`, processes its slice in order and hands its whole result
/// over once at the end.
pub fn run_harvest<F, P>(
    urls: &[String],
    batch_count: usize,
    factory: &F,
    parser: &RecordParser,
    stats: &HarvestStats,
) -> Result<Harvest, ConfigError>
where
    F: Fn() -> Result<P, FetchError> + Sync,
    P: PageFetcher,
{
    if batch_count == 0 {
        return Err(ConfigError::InvalidBatchCount);
    }

    let batches = partition(urls.len(), batch_count);
    // Empty batches spawn no worker, so they get no thread either
    let busy = batches.iter().filter(|r| !r.is_empty()).count().max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(busy)
        .thread_name(|i| format!("mineralis-worker-{i}"))
        .build()?;

    let shared = Shared::default();
    let status = StatusReporter::new(urls.len());
    info!(
        urls = urls.len(),
        batches = batch_count,
        workers = busy,
        "Starting harvest"
    );

    pool.scope(|s| {
        for (worker, range) in batches.into_iter().enumerate() {
            if range.is_empty() {
                continue;
            }
            let slice = &urls[range];
            let shared = &shared;
            let status = &status;
            s.spawn(move |_| {
                run_worker(worker, slice, factory, parser, shared, status, stats);
            });
        }
    });

    let failed_workers = status.finish();
    let (records, skipped) = shared.into_parts();
    info!(
        records = records.len(),
        skipped = skipped.len(),
        failed_workers = failed_workers.len(),
        "Harvest complete"
    );

    Ok(Harvest {
        records,
        skipped,
        failed_workers,
    })
}

fn run_worker<F, P>(
    worker: usize,
    urls: &[String],
    factory: &F,
    parser: &RecordParser,
    shared: &Shared,
    status: &StatusReporter,
    stats: &HarvestStats,
) where
    F: Fn() -> Result<P, FetchError> + Sync,
    P: PageFetcher,
{
    let fetcher = match factory() {
        Ok(fetcher) => fetcher,
        Err(e) => {
            stats.inc_workers_failed();
            status.worker_failed(FailedWorker {
                worker,
                urls: urls.len(),
                message: e.to_string(),
            });
            return;
        }
    };

    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for url in urls {
        // every URL visited for this link, to stop refresh loops
        let mut chain = FxHashSet::default();
        chain.insert(url.clone());
        let mut current = url.clone();

        loop {
            let start = Instant::now();
            let outcome = parser.parse_fetched(fetcher.fetch(&current));
            stats.inc_fetched();

            match outcome {
                ParseOutcome::Record(record) => {
                    stats.inc_records();
                    status.page_done(&record.name, start.elapsed());
                    records.push(record);
                }
                ParseOutcome::Redirect(target)
                    if chain.len() <= REDIRECT_MAX_DEPTH as usize
                        && chain.insert(target.clone()) =>
                {
                    stats.inc_redirects();
                    status.redirected(&current, &target);
                    current = target;
                    continue;
                }
                ParseOutcome::Redirect(_) => {
                    stats.inc_skipped();
                    status.page_skipped(&current, &SkipReason::RedirectLoop);
                    skipped.push(url.clone());
                }
                ParseOutcome::Skip(reason) => {
                    if reason == SkipReason::Timeout {
                        stats.inc_timeouts();
                    }
                    stats.inc_skipped();
                    status.page_skipped(&current, &reason);
                    skipped.push(url.clone());
                }
            }
            break;
        }
    }

    debug!(
        worker = worker,
        records = records.len(),
        skipped = skipped.len(),
        "Worker finished batch"
    );
    shared.hand_off(worker, records, skipped);
}
