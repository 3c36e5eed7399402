//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Validating configuration and guarding the seed
//! - Driving the frontier one depth level at a time
//! - Dispatching fetches under the scheduler's admission limits
//! - Running the content pipeline and writing records to the sink
//! - Halting on an open circuit breaker or a fatal output error
//!
//! # Run states
//!
//! ```text
//! Init -> Running -> Completed | CircuitOpen | FatalError
//! ```

use crate::config::{self, ScraperConfig};
use crate::content::{ContentPipeline, HtmlTextExtractor, ProcessedPage, TextExtractor};
use crate::crawler::breaker::{BreakerSnapshot, CircuitBreaker};
use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::crawler::frontier::{CrawlTask, Frontier};
use crate::crawler::scheduler::Scheduler;
use crate::output::{default_output_path, resolve_output_path, CrawlReport, CsvSink, RecordSink};
use crate::proxy::build_provider;
use crate::state::RunState;
use crate::url::{normalize_url, FilterDecision, HostGuard, UrlFilter};
use crate::{ConfigError, CrawlError, FetchError, WriteError};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

/// Everything a fetch task needs, shared across the run
struct Shared {
    scheduler: Arc<Scheduler>,
    fetcher: Arc<Fetcher>,
    pipeline: ContentPipeline,
    filter: Arc<UrlFilter>,
    max_depth: Option<u32>,
}

/// What a fetch task reports back to the coordinator
struct PageOutcome {
    task: CrawlTask,
    result: PageResult,
}

enum PageResult {
    Fetched {
        page: ProcessedPage,
        links: Vec<Url>,
        filtered: u64,
    },
    Failed(FetchError),
}

/// How a depth level ended
enum LevelOutcome {
    Drained,
    CircuitOpen,
}

#[derive(Debug, Default)]
struct RunCounters {
    pages_fetched: u64,
    pages_failed: u64,
    duplicate_chunks: u64,
    links_discovered: u64,
    links_filtered: u64,
    urls_enqueued: u64,
    max_depth_reached: u32,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<ScraperConfig>,
    seed: Url,
    state: RunState,
    filter: Arc<UrlFilter>,
    scheduler: Arc<Scheduler>,
    fetcher: Arc<Fetcher>,
    breaker: Arc<CircuitBreaker>,
    pipeline: ContentPipeline,
    sink: Option<Arc<dyn RecordSink>>,
    output_path: Option<PathBuf>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Validates the configuration and resolves the output path; nothing
    /// touches the network until [`run`](Self::run).
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlError)` - Invalid configuration, output path or HTTP client setup
    pub fn new(config: ScraperConfig) -> Result<Self, CrawlError> {
        config::validate(&config)?;

        let seed = normalize_url(&config.domain)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.domain, e)))?;

        let extractor = HtmlTextExtractor::from_selector(config.content.target_selector.as_deref())
            .map_err(ConfigError::Validation)?;
        let pipeline = ContentPipeline::new(Arc::new(extractor), config.content.split_length.limit());

        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        let provider = build_provider(&config.proxy);
        // One guard, so links and redirect hops share resolved hosts
        let guard = Arc::new(HostGuard::new(config.filter.block_private_hosts));
        let fetcher = Fetcher::new(
            &config.http,
            Arc::clone(&provider),
            Arc::clone(&breaker),
            Arc::clone(&guard),
        )?;
        tracing::debug!("Using proxy provider {}", provider.name());

        let root = config
            .output
            .root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let requested = config
            .output
            .path
            .clone()
            .unwrap_or_else(|| default_output_path(&seed));
        let output_path = resolve_output_path(&root, &requested)?;

        Ok(Self {
            filter: Arc::new(UrlFilter::new(&config.filter, &seed, guard)),
            scheduler: Arc::new(Scheduler::new(&config.crawler)),
            fetcher: Arc::new(fetcher),
            breaker,
            pipeline,
            sink: None,
            output_path: Some(output_path),
            state: RunState::Init,
            seed,
            config: Arc::new(config),
        })
    }

    /// Writes records to `sink` instead of the configured CSV file
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self.output_path = None;
        self
    }

    /// Replaces the HTML text extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.pipeline = ContentPipeline::new(extractor, self.config.content.split_length.limit());
        self
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Where records will be written, unless a custom sink was supplied
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Runs the crawl to a terminal state
    ///
    /// Returns the report for `Completed` and `CircuitOpen` runs. A fatal
    /// error is returned as `Err` after the partial output has been flushed.
    /// The run summary is logged in every case.
    pub async fn run(mut self) -> Result<CrawlReport, CrawlError> {
        let started_at = Utc::now();
        let mut counters = RunCounters::default();

        tracing::info!(
            "Starting crawl of {} (max depth: {}, concurrency: {}, per host: {})",
            self.seed,
            self.config
                .crawler
                .max_depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unbounded".to_string()),
            self.config.crawler.concurrent_requests,
            self.config.crawler.connections_per_host
        );

        if !self.filter.allows_host(&self.seed).await {
            self.state.transition(RunState::FatalError)?;
            self.report(started_at, &counters, 0).log();
            return Err(ConfigError::ForbiddenSeed(self.seed.to_string()).into());
        }

        let sink = match self.open_sink() {
            Ok(sink) => sink,
            Err(e) => {
                tracing::error!("Cannot open output: {}", e);
                self.state.transition(RunState::FatalError)?;
                self.report(started_at, &counters, 0).log();
                return Err(e.into());
            }
        };

        self.state.transition(RunState::Running)?;

        let mut frontier = Frontier::new(self.config.crawler.max_depth);
        if frontier.enqueue(self.seed.clone(), 0) {
            counters.urls_enqueued += 1;
        }

        let shared = Arc::new(Shared {
            scheduler: Arc::clone(&self.scheduler),
            fetcher: Arc::clone(&self.fetcher),
            pipeline: self.pipeline.clone(),
            filter: Arc::clone(&self.filter),
            max_depth: self.config.crawler.max_depth,
        });

        let mut terminal = RunState::Completed;
        while let Some(depth) = frontier.next_depth() {
            let batch = frontier.next_batch(depth);
            counters.max_depth_reached = depth;
            tracing::info!(
                "Depth {}: {} pages to fetch ({} URLs enqueued so far)",
                depth,
                batch.len(),
                frontier.enqueued_count()
            );

            match run_level(&shared, batch, &mut frontier, &mut counters, sink.as_ref()).await {
                Ok(LevelOutcome::Drained) => {}
                Ok(LevelOutcome::CircuitOpen) => {
                    let dropped = frontier.clear_pending();
                    tracing::warn!(
                        "Circuit breaker open, stopping crawl ({} queued URLs dropped)",
                        dropped
                    );
                    terminal = RunState::CircuitOpen;
                    break;
                }
                Err(e) => {
                    tracing::error!("Fatal output error: {}", e);
                    if let Err(finish_err) = sink.finish() {
                        tracing::error!("Failed to close output: {}", finish_err);
                    }
                    self.state.transition(RunState::FatalError)?;
                    self.report_with_sink(started_at, &counters, sink.as_ref()).log();
                    return Err(e.into());
                }
            }
        }

        if let Err(e) = sink.finish() {
            tracing::error!("Failed to close output: {}", e);
            self.state.transition(RunState::FatalError)?;
            self.report_with_sink(started_at, &counters, sink.as_ref()).log();
            return Err(e.into());
        }

        self.state.transition(terminal)?;
        let report = self.report_with_sink(started_at, &counters, sink.as_ref());
        report.log();
        Ok(report)
    }

    fn open_sink(&mut self) -> Result<Arc<dyn RecordSink>, WriteError> {
        if let Some(sink) = self.sink.take() {
            return Ok(sink);
        }
        let path = self
            .output_path
            .clone()
            .unwrap_or_else(|| default_output_path(&self.seed));
        Ok(Arc::new(CsvSink::create(&path)?))
    }

    fn report(&self, started_at: DateTime<Utc>, counters: &RunCounters, records: u64) -> CrawlReport {
        CrawlReport {
            state: self.state,
            started_at,
            finished_at: Utc::now(),
            max_depth_reached: counters.max_depth_reached,
            pages_fetched: counters.pages_fetched,
            pages_failed: counters.pages_failed,
            records_written: records,
            duplicate_chunks: counters.duplicate_chunks,
            links_discovered: counters.links_discovered,
            links_filtered: counters.links_filtered,
            urls_enqueued: counters.urls_enqueued,
            breaker: self.breaker_snapshot(),
            output_path: self.output_path.clone(),
        }
    }

    fn report_with_sink(
        &self,
        started_at: DateTime<Utc>,
        counters: &RunCounters,
        sink: &dyn RecordSink,
    ) -> CrawlReport {
        self.report(started_at, counters, sink.records_written())
    }

    fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }
}

/// Fetches one depth level
///
/// Tasks are dispatched while global permits are free, then one completion
/// is handled before dispatching again. Once the breaker refuses requests the
/// remaining queue is dropped and in-flight tasks are drained.
async fn run_level(
    shared: &Arc<Shared>,
    batch: Vec<CrawlTask>,
    frontier: &mut Frontier,
    counters: &mut RunCounters,
    sink: &dyn RecordSink,
) -> Result<LevelOutcome, WriteError> {
    let mut queue: VecDeque<CrawlTask> = batch.into();
    let mut tasks: JoinSet<PageOutcome> = JoinSet::new();
    let mut halted = false;

    loop {
        if !halted && !shared.fetcher.breaker().allow_request() {
            halted = true;
            if !queue.is_empty() {
                tracing::debug!("Dropping {} undispatched tasks", queue.len());
            }
            queue.clear();
        }

        if queue.is_empty() && tasks.is_empty() {
            break;
        }

        while !queue.is_empty() {
            // All global slots busy; wait for a completion below
            let Some(permit) = shared.scheduler.try_acquire_global() else {
                break;
            };
            let Some(task) = queue.pop_front() else {
                break;
            };
            let shared = Arc::clone(shared);
            tasks.spawn(async move {
                let _permit = permit;
                process_task(shared, task).await
            });
        }

        match tasks.join_next().await {
            Some(Ok(outcome)) => {
                if let Err(e) = handle_outcome(outcome, frontier, counters, sink, !halted) {
                    tasks.abort_all();
                    return Err(e);
                }
            }
            Some(Err(e)) => {
                tracing::error!("Fetch task failed: {}", e);
                counters.pages_failed += 1;
            }
            None => {}
        }
    }

    Ok(if halted {
        LevelOutcome::CircuitOpen
    } else {
        LevelOutcome::Drained
    })
}

/// Fetches, extracts and filters one page
async fn process_task(shared: Arc<Shared>, task: CrawlTask) -> PageOutcome {
    let fetched = {
        let Some(_host_permit) = shared.scheduler.admit(&task.url).await else {
            let error = FetchError::Connection {
                url: task.url.to_string(),
                message: "host slot unavailable".to_string(),
            };
            return PageOutcome {
                task,
                result: PageResult::Failed(error),
            };
        };
        shared.fetcher.fetch(&task.url).await
    };

    let (final_url, body) = match fetched {
        FetchResult::Success {
            final_url,
            status_code,
            body,
            ..
        } => {
            tracing::debug!("Fetched {} ({}, {} bytes)", task.url, status_code, body.len());
            (final_url, body)
        }
        FetchResult::Failed { error, .. } => {
            return PageOutcome {
                task,
                result: PageResult::Failed(error),
            };
        }
    };

    let page = shared.pipeline.process(&task.url, &body);

    let mut links = Vec::new();
    let mut filtered = 0;
    let follow = shared.max_depth.map_or(true, |max| task.depth < max);
    if follow {
        for href in &page.hrefs {
            match shared.filter.accept(href, &final_url).await {
                FilterDecision::Accepted(url) => links.push(url),
                FilterDecision::Rejected(reason) => {
                    tracing::debug!("Skipping link {} on {}: {}", href, task.url, reason);
                    filtered += 1;
                }
            }
        }
    }

    PageOutcome {
        task,
        result: PageResult::Fetched {
            page,
            links,
            filtered,
        },
    }
}

/// Writes a page's records and enqueues its links
///
/// Links are only enqueued while the run is still dispatching.
fn handle_outcome(
    outcome: PageOutcome,
    frontier: &mut Frontier,
    counters: &mut RunCounters,
    sink: &dyn RecordSink,
    accept_links: bool,
) -> Result<(), WriteError> {
    let PageOutcome { task, result } = outcome;

    match result {
        PageResult::Fetched {
            page,
            links,
            filtered,
        } => {
            counters.pages_fetched += 1;
            counters.duplicate_chunks += page.duplicates as u64;
            counters.links_discovered += page.hrefs.len() as u64;
            counters.links_filtered += filtered;

            for record in &page.records {
                sink.write(record)?;
            }
            sink.flush()?;

            let mut enqueued = 0;
            if accept_links {
                for link in links {
                    if frontier.enqueue(link, task.depth + 1) {
                        enqueued += 1;
                    }
                }
            }
            counters.urls_enqueued += enqueued;

            tracing::info!(
                "Processed {} (depth {}): {} records, {} new links",
                task.url,
                task.depth,
                page.records.len(),
                enqueued
            );
        }
        PageResult::Failed(error) => {
            counters.pages_failed += 1;
            if !error.is_circuit_open() {
                tracing::debug!("Giving up on {} (depth {})", task.url, task.depth);
            }
        }
    }

    Ok(())
}

/// Runs a complete crawl with the default CSV sink
pub async fn crawl(config: ScraperConfig) -> Result<CrawlReport, CrawlError> {
    Coordinator::new(config)?.run().await
}
