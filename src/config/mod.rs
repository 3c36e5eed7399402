//! Configuration module for sitechunk
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A configuration is validated once, before any network activity.
//!
//! # Example
//!
//! ```no_run
//! use sitechunk::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will use max depth: {:?}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CircuitBreakerConfig, ContentConfig, CrawlerConfig, FilterConfig, HttpConfig, OutputConfig,
    ProxyConfig, ScraperConfig, SplitLength,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
