//! sitechunk: a bounded website crawler that emits deduplicated text chunks
//!
//! This crate crawls a site breadth-first from a seed URL, fetches pages under
//! global and per-host concurrency limits, retries transient failures with
//! exponential backoff, halts through a circuit breaker when a site keeps
//! failing, and turns every fetched page into deduplicated, injection-safe
//! text records.

pub mod config;
pub mod content;
pub mod crawler;
pub mod output;
pub mod proxy;
pub mod state;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Run-level error type for sitechunk operations
///
/// Only configuration and output failures abort a crawl. Per-page fetch
/// failures are reported as [`FetchError`] values and never surface here.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Output error: {0}")]
    Write(#[from] WriteError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunState,
        to: state::RunState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Seed URL targets a private or internal host: {0}")]
    ForbiddenSeed(String),
}

/// Per-URL fetch failures
///
/// These are recovered by skipping the URL; they never abort the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Redirect from {url} refused: {reason}")]
    Redirect { url: String, reason: String },

    #[error("Gave up on {url} after {attempts} attempts (last status: {last_status:?})")]
    ExhaustedRetries {
        url: String,
        attempts: u32,
        last_status: Option<u16>,
    },

    #[error("Not fetching {url}: {source}")]
    CircuitOpen {
        url: String,
        source: CircuitOpenError,
    },
}

impl FetchError {
    /// The last HTTP status code observed for this URL, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::ExhaustedRetries { last_status, .. } => *last_status,
            _ => None,
        }
    }

    /// Returns true if the breaker refused the request
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

/// Raised when the circuit breaker no longer admits requests
#[derive(Debug, Clone, Error)]
#[error(
    "circuit breaker open ({} failures in {} requests, {} consecutive)",
    .snapshot.total_failures,
    .snapshot.total_requests,
    .snapshot.consecutive_failures
)]
pub struct CircuitOpenError {
    pub snapshot: crawler::BreakerSnapshot,
}

/// Output errors; any of these is fatal for the run
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output path {path} escapes output root {root}")]
    PathTraversal { path: PathBuf, root: PathBuf },

    #[error("Sink is already closed")]
    Closed,
}

/// Result type alias for sitechunk operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use crate::config::ScraperConfig;
pub use crate::content::ContentRecord;
pub use crate::crawler::{crawl, Coordinator};
pub use crate::output::CrawlReport;
pub use crate::state::RunState;
pub use crate::url::{normalize_url, FilterDecision, Rejection, UrlFilter};
