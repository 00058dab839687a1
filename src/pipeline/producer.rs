//! Producer stage: source -> work queue
//!
//! Pushes every identifier in source order, blocking while the queue is full,
//! then pushes one [`WorkItem::Stop`] per worker. The stop signals are sent
//! even when the source fails part-way, so workers are never left waiting on
//! a queue nobody will fill.

use super::cancel::CancelToken;
use super::message::{WorkItem, WorkSender};
use crate::error::{EnrichError, Result};
use crate::types::Identifier;
use crossbeam_channel::select;

/// Counters reported by the producer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    /// Identifiers pushed onto the work queue
    pub identifiers_sent: u64,
    /// Stop signals pushed onto the work queue
    pub stops_sent: usize,
}

/// Single producer feeding the work queue
pub struct Producer {
    work_tx: WorkSender,
    worker_count: usize,
    cancel: CancelToken,
}

impl Producer {
    /// Create a producer for `worker_count` workers
    pub fn new(work_tx: WorkSender, worker_count: usize, cancel: CancelToken) -> Self {
        Self {
            work_tx,
            worker_count,
            cancel,
        }
    }

    /// Drain `source` into the work queue, then signal the end of work
    ///
    /// Returns the source error (after the stop signals went out) if the
    /// source failed, or [`EnrichError::Cancelled`] if the run was cancelled.
    pub fn run<S>(self, source: S) -> Result<ProducerReport>
    where
        S: IntoIterator<Item = Result<Identifier>>,
    {
        tracing::info!("Producer started ({} workers)", self.worker_count);

        let mut report = ProducerReport::default();
        let mut failure = None;

        for item in source {
            let identifier = match item {
                Ok(identifier) => identifier,
                Err(err) => {
                    tracing::error!(
                        "Source failed after {} identifiers: {}",
                        report.identifiers_sent,
                        err
                    );
                    failure = Some(err);
                    break;
                }
            };

            if let Err(err) = self.send(WorkItem::Lookup(identifier)) {
                failure = Some(err);
                break;
            }
            report.identifiers_sent += 1;
        }

        report.stops_sent = self.send_stops();
        tracing::info!(
            "Producer finished: {} identifiers, {} stop signals",
            report.identifiers_sent,
            report.stops_sent
        );

        match failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Push one stop per worker; gives up early only if nobody can receive
    fn send_stops(&self) -> usize {
        let mut sent = 0;
        for _ in 0..self.worker_count {
            match self.send(WorkItem::Stop) {
                Ok(()) => sent += 1,
                Err(err) => {
                    tracing::debug!("Stopped sending stop signals: {}", err);
                    break;
                }
            }
        }
        sent
    }

    /// Blocking push that gives up on cancellation or when all workers are gone
    fn send(&self, item: WorkItem) -> Result<()> {
        select! {
            send(self.work_tx, item) -> res => res.map_err(|_| {
                EnrichError::Channel("work queue closed: no workers left".to_string())
            }),
            recv(self.cancel.receiver()) -> _ => Err(EnrichError::Cancelled),
        }
    }
}
