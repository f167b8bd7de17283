use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collected while harvesting detail pages
#[derive(Default)]
pub struct HarvestStats {
    pub pages_fetched: AtomicU64,
    pub records_parsed: AtomicU64,
    pub pages_skipped: AtomicU64,
    pub timeouts: AtomicU64,
    pub redirects_followed: AtomicU64,
    pub workers_failed: AtomicU64,
}

/// Plain copy of the counters for reporting
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub pages_fetched: u64,
    pub records_parsed: u64,
    pub pages_skipped: u64,
    pub timeouts: u64,
    pub redirects_followed: u64,
    pub workers_failed: u64,
}

impl HarvestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_records(&self) {
        self.records_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.pages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects(&self) {
        self.redirects_followed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_workers_failed(&self) {
        self.workers_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetched(&self) -> u64 {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records_parsed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.pages_skipped.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn redirects(&self) -> u64 {
        self.redirects_followed.load(Ordering::Relaxed)
    }

    pub fn failed_workers(&self) -> u64 {
        self.workers_failed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages_fetched: self.fetched(),
            records_parsed: self.records(),
            pages_skipped: self.skipped(),
            timeouts: self.timed_out(),
            redirects_followed: self.redirects(),
            workers_failed: self.failed_workers(),
        }
    }
}
