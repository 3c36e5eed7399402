//! Run summary
//!
//! The summary is produced for every run regardless of how it ended and is
//! both logged and (by the binary) printed.

use crate::crawler::BreakerSnapshot;
use crate::state::RunState;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Counters and outcome of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Terminal state of the run
    pub state: RunState,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Deepest level that was dispatched
    pub max_depth_reached: u32,

    pub pages_fetched: u64,
    pub pages_failed: u64,

    /// Records handed to the sink
    pub records_written: u64,

    /// Chunks dropped by content dedup
    pub duplicate_chunks: u64,

    /// Raw hrefs seen on fetched pages
    pub links_discovered: u64,

    /// Hrefs rejected by the link filter
    pub links_filtered: u64,

    /// URLs accepted into the frontier, including the seed
    pub urls_enqueued: u64,

    /// Circuit breaker counters at the end of the run
    pub breaker: BreakerSnapshot,

    pub output_path: Option<PathBuf>,
}

impl CrawlReport {
    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Logs the summary; called once at the end of every run
    pub fn log(&self) {
        tracing::info!(
            "Crawl finished: state={} pages_fetched={} pages_failed={} records={} duplicates={} depth={} duration={:.1}s",
            self.state,
            self.pages_fetched,
            self.pages_failed,
            self.records_written,
            self.duplicate_chunks,
            self.max_depth_reached,
            self.duration_seconds()
        );
        tracing::info!(
            "Circuit breaker: state={} total_requests={} total_failures={} consecutive_failures={}",
            self.breaker.state,
            self.breaker.total_requests,
            self.breaker.total_failures,
            self.breaker.consecutive_failures
        );
    }
}

/// Prints the summary to stdout in a formatted manner
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Summary ===\n");

    println!("Outcome: {}", report.state);
    println!(
        "Duration: {:.1}s (started {})",
        report.duration_seconds(),
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    println!("Pages:");
    println!("  Fetched: {}", report.pages_fetched);
    println!("  Failed: {}", report.pages_failed);
    println!("  Deepest level: {}", report.max_depth_reached);
    println!();

    println!("Links:");
    println!("  Discovered: {}", report.links_discovered);
    println!("  Filtered out: {}", report.links_filtered);
    println!("  Enqueued: {}", report.urls_enqueued);
    println!();

    println!("Content:");
    println!("  Records written: {}", report.records_written);
    println!("  Duplicate chunks dropped: {}", report.duplicate_chunks);
    if let Some(path) = &report.output_path {
        println!("  Output: {}", path.display());
    }
    println!();

    let failure_rate = report.breaker.failure_rate() * 100.0;
    println!("Requests:");
    println!("  Total: {}", report.breaker.total_requests);
    println!(
        "  Failed: {} ({:.1}%)",
        report.breaker.total_failures, failure_rate
    );
    println!("  Circuit breaker: {}", report.breaker.state);
}
