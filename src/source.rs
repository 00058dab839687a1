//! Identifier source reading one column of a tab-separated file
//!
//! The source is a lazy iterator: records are parsed as the producer pulls
//! them, so memory use does not depend on the input size. Records that are
//! too short or have an empty identifier are skipped with a warning;
//! undecodable records are skipped the same way. Only I/O failures are
//! surfaced as [`EnrichError::SourceRead`].

use crate::config::SourceConfig;
use crate::error::{EnrichError, Result};
use crate::types::Identifier;
use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lazy iterator over the identifiers of a delimited input
pub struct TsvSource<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    column: usize,
    skipped: Arc<AtomicU64>,
    failed: bool,
}

impl TsvSource<File> {
    /// Open the file named in `config`
    pub fn open(config: &SourceConfig) -> Result<Self> {
        let file = File::open(&config.path).map_err(|e| {
            EnrichError::SourceRead(format!("Failed to open {:?}: {}", config.path, e))
        })?;
        tracing::info!("Reading identifiers from {:?} (column {})", config.path, config.column);
        Ok(Self::from_reader(file, config.column, config.has_headers))
    }
}

impl<R: Read> TsvSource<R> {
    /// Read identifiers from any reader
    pub fn from_reader(reader: R, column: usize, has_headers: bool) -> Self {
        let records = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(has_headers)
            .flexible(true)
            .quoting(false)
            .from_reader(reader)
            .into_records();

        Self {
            records,
            column,
            skipped: Arc::new(AtomicU64::new(0)),
            failed: false,
        }
    }

    /// Number of records skipped so far
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Shared skip counter, still readable once the source has moved to the
    /// producer thread
    pub fn skip_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.skipped)
    }

    fn skip(&mut self, line: Option<u64>, reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        match line {
            Some(line) => tracing::warn!("Skipping input line {}: {}", line, reason),
            None => tracing::warn!("Skipping input record: {}", reason),
        }
    }
}

impl<R: Read> Iterator for TsvSource<R> {
    type Item = Result<Identifier>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            match self.records.next()? {
                Ok(record) => {
                    let line = record.position().map(|p| p.line());
                    match record.get(self.column) {
                        Some(value) if !value.is_empty() => {
                            return Some(Ok(Identifier::new(value)));
                        }
                        Some(_) => self.skip(line, "empty identifier"),
                        None => self.skip(line, "missing identifier column"),
                    }
                }
                Err(err) if err.is_io_error() => {
                    self.failed = true;
                    return Some(Err(err.into()));
                }
                Err(err) => {
                    let line = err.position().map(|p| p.line());
                    self.skip(line, &err.to_string());
                }
            }
        }
    }
}
