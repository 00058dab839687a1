//! Line-oriented output sinks
//!
//! A [`LineSink`] is append-only and owned by exactly one thread at a time
//! (the writer stage during the run, the driver afterwards), so it needs no
//! locking. Every write failure becomes [`EnrichError::SinkWrite`].

use crate::config::OutputConfig;
use crate::error::{EnrichError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Buffered, append-only line writer
pub struct LineSink {
    writer: BufWriter<Box<dyn Write + Send>>,
    label: String,
    lines_written: u64,
}

impl std::fmt::Debug for LineSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSink")
            .field("label", &self.label)
            .field("lines_written", &self.lines_written)
            .finish()
    }
}

impl LineSink {
    /// Open `path`, appending or truncating
    pub fn open(path: impl AsRef<Path>, append: bool) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EnrichError::SinkWrite(format!("Failed to create {:?}: {}", parent, e))
                })?;
            }
        }

        let file: File = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|e| EnrichError::SinkWrite(format!("Failed to open {:?}: {}", path, e)))?;

        Ok(Self::from_writer(file, path.display().to_string()))
    }

    /// Wrap an arbitrary writer
    pub fn from_writer(writer: impl Write + Send + 'static, label: impl Into<String>) -> Self {
        Self {
            writer: BufWriter::new(Box::new(writer)),
            label: label.into(),
            lines_written: 0,
        }
    }

    /// Human readable name used in errors and logs
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Lines written so far
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Write `line` followed by a line terminator
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|e| EnrichError::SinkWrite(format!("{}: {}", self.label, e)))?;
        self.lines_written += 1;
        Ok(())
    }

    /// Flush buffered lines to the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| EnrichError::SinkWrite(format!("{}: {}", self.label, e)))
    }

    /// Flush and close, returning the number of lines written
    pub fn close(mut self) -> Result<u64> {
        self.flush()?;
        tracing::debug!("Closed {} after {} lines", self.label, self.lines_written);
        Ok(self.lines_written)
    }
}

/// The sinks of one run
///
/// All of them are opened before any stage starts so a bad path fails the
/// run up front instead of after the lookups were paid for.
#[derive(Debug)]
pub struct Outputs {
    pub records: LineSink,
    pub summary: LineSink,
    pub failures: Option<LineSink>,
}

impl Outputs {
    /// Open every target named in `config`
    pub fn open(config: &OutputConfig) -> Result<Self> {
        let records = LineSink::open(&config.records_path, config.append)?;
        let summary = LineSink::open(&config.summary_path, config.append)?;
        let failures = config
            .failures_path
            .as_ref()
            .map(|path| LineSink::open(path, config.append))
            .transpose()?;

        tracing::info!(
            "Writing records to {}, summary to {}{}",
            records.label(),
            summary.label(),
            if config.append { " (append)" } else { "" }
        );

        Ok(Self {
            records,
            summary,
            failures,
        })
    }

    /// Build from arbitrary sinks
    pub fn new(records: LineSink, summary: LineSink, failures: Option<LineSink>) -> Self {
        Self {
            records,
            summary,
            failures,
        }
    }
}

/// Writer that always fails, for exercising sink error paths
#[cfg(test)]
pub(crate) struct BrokenWriter;

#[cfg(test)]
impl Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
    }
}
