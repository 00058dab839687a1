//! Writer stage: result queue -> sinks + summary set
//!
//! The writer is the only thread that touches any output during the run, so
//! lines never interleave and the summary set needs no lock. It stops on
//! [`ResultItem::Stop`], which the driver sends only after every worker has
//! exited. Its barrier slot is released when it returns, including when a
//! sink write fails.

use super::barrier::CompletionToken;
use super::cancel::CancelToken;
use super::message::{ResultItem, ResultReceiver};
use super::summary::SummarySet;
use crate::config::FailurePolicy;
use crate::error::Result;
use crate::sink::LineSink;
use crate::types::{Category, FailedLookup, LookupResult};
use crossbeam_channel::select;

/// Everything the writer hands back to the driver
#[derive(Debug)]
pub struct WriterOutcome {
    /// Records sink, flushed but still open
    pub records: LineSink,
    /// Failures sink, flushed but still open
    pub failures: Option<LineSink>,
    /// Categories of successful lookups
    pub summary: SummarySet,
    /// Successful lookups written
    pub found: u64,
    /// Failed lookups handled (written or skipped per policy)
    pub failed: u64,
    /// Whether the writer stopped because of cancellation
    pub cancelled: bool,
}

/// Single consumer of the result queue
pub struct Writer {
    result_rx: ResultReceiver,
    records: LineSink,
    failures: Option<LineSink>,
    policy: FailurePolicy,
    progress_interval: u64,
    cancel: CancelToken,
    summary: SummarySet,
    found: u64,
    failed: u64,
    _done: CompletionToken,
}

impl Writer {
    /// Create the writer holding its barrier slot
    pub fn new(
        result_rx: ResultReceiver,
        records: LineSink,
        failures: Option<LineSink>,
        policy: FailurePolicy,
        cancel: CancelToken,
        done: CompletionToken,
    ) -> Self {
        Self {
            result_rx,
            records,
            failures,
            policy,
            progress_interval: 0,
            cancel,
            summary: SummarySet::new(),
            found: 0,
            failed: 0,
            _done: done,
        }
    }

    /// Log progress every `interval` results (0 disables)
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Consume results until the stop signal
    pub fn run(mut self) -> Result<WriterOutcome> {
        tracing::info!("Writer started ({})", self.records.label());

        let mut cancelled = false;
        loop {
            let item = select! {
                recv(self.result_rx) -> msg => msg.ok(),
                recv(self.cancel.receiver()) -> _ => {
                    cancelled = true;
                    break;
                }
            };

            match item {
                Some(ResultItem::Stop) => break,
                Some(item) => self.handle(item)?,
                None => {
                    tracing::warn!("Result queue closed without a stop signal");
                    break;
                }
            }
        }

        if cancelled {
            // Keep whatever finished before the cancel landed, up to the stop.
            let pending: Vec<_> = self
                .result_rx
                .try_iter()
                .take_while(|item| !matches!(item, ResultItem::Stop))
                .collect();
            for item in pending {
                self.handle(item)?;
            }
        }

        self.records.flush()?;
        if let Some(ref mut failures) = self.failures {
            failures.flush()?;
        }

        tracing::info!(
            "Writer finished: {} records ({} lines to {}), {} failures, {} distinct categories",
            self.found,
            self.records.lines_written(),
            self.records.label(),
            self.failed,
            self.summary.len()
        );

        Ok(WriterOutcome {
            records: self.records,
            failures: self.failures,
            summary: self.summary,
            found: self.found,
            failed: self.failed,
            cancelled,
        })
    }

    fn handle(&mut self, item: ResultItem) -> Result<()> {
        match item {
            ResultItem::Found(result) => self.write_found(result)?,
            ResultItem::Failed(failed) => self.write_failed(failed)?,
            ResultItem::Stop => {}
        }

        let handled = self.found + self.failed;
        if self.progress_interval > 0 && handled % self.progress_interval == 0 {
            tracing::info!(
                "Progress: {} results ({} failed), {} distinct categories",
                handled,
                self.failed,
                self.summary.len()
            );
        }
        Ok(())
    }

    fn write_found(&mut self, result: LookupResult) -> Result<()> {
        self.records.write_line(&result.to_line())?;
        self.summary.insert(result.category);
        self.found += 1;
        Ok(())
    }

    fn write_failed(&mut self, failed: FailedLookup) -> Result<()> {
        match self.policy {
            FailurePolicy::Marker => {
                let marked = LookupResult::new(failed.identifier, Category::failure());
                self.records.write_line(&marked.to_line())?;
            }
            FailurePolicy::Skip => {
                if let Some(ref mut failures) = self.failures {
                    failures.write_line(&failed.to_line())?;
                }
            }
        }
        self.failed += 1;
        Ok(())
    }
}
