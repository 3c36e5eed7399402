//! Output module for crawl records and run summaries
//!
//! This module handles:
//! - Writing content records through a [`RecordSink`] (CSV by default)
//! - Neutralizing spreadsheet formulas in written fields
//! - Keeping output paths inside the configured output root
//! - Reporting run statistics

mod sink;
pub mod stats;

pub use sink::{
    default_output_path, neutralize_formula, resolve_output_path, CsvSink, MemorySink, RecordSink,
};
pub use stats::{print_report, CrawlReport};
