//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The depth-bounded frontier
//! - Admission control (global and per-host limits, pacing)
//! - HTTP fetching with retry and backoff
//! - The circuit breaker
//! - Overall crawl coordination

mod breaker;
mod coordinator;
mod fetcher;
mod frontier;
mod retry;
mod scheduler;

pub use breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use coordinator::{crawl, Coordinator};
pub use fetcher::{FetchResult, Fetcher};
pub use frontier::{CrawlTask, Frontier};
pub use retry::{parse_retry_after, AttemptFailure, RetryPolicy};
pub use scheduler::Scheduler;
