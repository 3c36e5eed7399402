//! Record sinks
//!
//! A sink is the single writer for a run's records. Calls from concurrent
//! tasks are serialized behind a lock, so rows are never interleaved.

use crate::content::ContentRecord;
use crate::url::host_key;
use crate::WriteError;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use url::Url;

/// Characters that make spreadsheet applications evaluate a cell
const FORMULA_TRIGGERS: &[char] = &['=', '+', '-', '@', '\t', '\r'];

const CSV_HEADER: [&str; 3] = ["URL", "Content", "Chunk Number"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Destination for content records
pub trait RecordSink: Send + Sync {
    /// Appends one record
    fn write(&self, record: &ContentRecord) -> Result<(), WriteError>;

    /// Pushes buffered records to the underlying storage
    fn flush(&self) -> Result<(), WriteError>;

    /// Flushes and closes the sink; later writes fail with [`WriteError::Closed`]
    fn finish(&self) -> Result<(), WriteError>;

    /// Number of records written so far
    fn records_written(&self) -> u64;
}

/// Prefixes a field with `'` when it would start a spreadsheet formula
pub fn neutralize_formula(value: &str) -> String {
    if value.starts_with(FORMULA_TRIGGERS) {
        format!("'{}", value)
    } else {
        value.to_string()
    }
}

/// Resolves `requested` under `root`, rejecting paths that escape it
///
/// Relative paths may not contain `..`. Absolute paths are accepted only
/// when they lie inside `root`.
pub fn resolve_output_path(root: &Path, requested: &Path) -> Result<PathBuf, WriteError> {
    let traversal = || WriteError::PathTraversal {
        path: requested.to_path_buf(),
        root: root.to_path_buf(),
    };

    if requested
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(traversal());
    }

    if requested.is_absolute() || requested.has_root() {
        return if requested.starts_with(root) {
            Ok(requested.to_path_buf())
        } else {
            Err(traversal())
        };
    }

    Ok(root.join(requested))
}

/// `<sanitized seed host>/scraped_data.csv`
pub fn default_output_path(seed: &Url) -> PathBuf {
    let sanitized: String = host_key(seed)
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    let directory = if sanitized.is_empty() {
        "scraped_data"
    } else {
        sanitized
    };
    Path::new(directory).join("scraped_data.csv")
}

struct CsvState {
    writer: Option<csv::Writer<File>>,
    written: u64,
}

/// CSV sink with columns `URL,Content,Chunk Number`
///
/// The file starts with a UTF-8 BOM so spreadsheet tools pick the right
/// encoding. URL and text fields are passed through [`neutralize_formula`].
pub struct CsvSink {
    state: Mutex<CsvState>,
}

impl CsvSink {
    /// Creates (or truncates) the file at `path` and writes the header
    pub fn create(path: &Path) -> Result<Self, WriteError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = File::create(path)?;
        file.write_all(UTF8_BOM)?;

        let mut writer = csv::WriterBuilder::new().from_writer(file);
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;

        tracing::info!("Writing records to {}", path.display());

        Ok(Self {
            state: Mutex::new(CsvState {
                writer: Some(writer),
                written: 0,
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CsvState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordSink for CsvSink {
    fn write(&self, record: &ContentRecord) -> Result<(), WriteError> {
        let mut state = self.lock();
        let writer = state.writer.as_mut().ok_or(WriteError::Closed)?;
        writer.write_record([
            neutralize_formula(&record.url),
            neutralize_formula(&record.text),
            record.chunk_index.to_string(),
        ])?;
        state.written += 1;
        Ok(())
    }

    fn flush(&self) -> Result<(), WriteError> {
        let mut state = self.lock();
        match state.writer.as_mut() {
            Some(writer) => Ok(writer.flush()?),
            None => Err(WriteError::Closed),
        }
    }

    fn finish(&self) -> Result<(), WriteError> {
        let mut state = self.lock();
        match state.writer.take() {
            Some(mut writer) => {
                writer.flush()?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn records_written(&self) -> u64 {
        self.lock().written
    }
}

/// Keeps records in memory; used for dry runs and embedding
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ContentRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record written so far
    pub fn records(&self) -> Vec<ContentRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RecordSink for MemorySink {
    fn write(&self, record: &ContentRecord) -> Result<(), WriteError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    fn flush(&self) -> Result<(), WriteError> {
        Ok(())
    }

    fn finish(&self) -> Result<(), WriteError> {
        Ok(())
    }

    fn records_written(&self) -> u64 {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len() as u64
    }
}
