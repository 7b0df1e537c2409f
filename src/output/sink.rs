//! JSON output sink
//!
//! Output is written to a temporary file in the target directory and then
//! renamed over the target, so an existing file is either fully replaced or
//! left untouched.

use crate::output::result::CrawlResult;
use crate::SinkError;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Destination for the records of a finished crawl
pub trait OutputSink {
    /// Writes every record of `result`
    ///
    /// On failure the result is untouched, so the caller may retry.
    fn write(&self, result: &CrawlResult) -> Result<(), SinkError>;
}

/// Writes records as one JSON array
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: PathBuf,
    pretty: bool,
}

impl JsonSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pretty: true,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for JsonSink {
    fn write(&self, result: &CrawlResult) -> Result<(), SinkError> {
        if result.records.is_empty() {
            tracing::warn!("No records scraped; check the start URLs and selectors");
        }

        write_json_atomic(&self.path, &result.records, self.pretty)?;
        tracing::info!("Wrote {} records to {}", result.records.len(), self.path.display());
        Ok(())
    }
}

/// Writes the failure diagnostics of `result` as a JSON array
pub fn write_failures(result: &CrawlResult, path: &Path, pretty: bool) -> Result<(), SinkError> {
    write_json_atomic(path, &result.failures, pretty)?;
    tracing::info!("Wrote {} failure diagnostics to {}", result.failures.len(), path.display());
    Ok(())
}

/// Serializes `value` into a temp file next to `path`, then renames it
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<(), SinkError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut temp = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        if pretty {
            serde_json::to_writer_pretty(&mut writer, value)?;
        } else {
            serde_json::to_writer(&mut writer, value)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    temp.persist(path)
        .map_err(|e| SinkError::Persist(format!("{}: {}", path.display(), e.error)))?;
    Ok(())
}
