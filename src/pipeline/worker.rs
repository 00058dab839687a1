//! Worker stage: work queue -> lookup -> result queue
//!
//! Each worker loops until it takes a [`WorkItem::Stop`]. Workers share
//! nothing but the two queues, the lookup client, and their slot in the
//! workers-done barrier, which is released when the worker is dropped.
//! Pushing onto a full result queue blocks the worker; that is the
//! backpressure path that eventually throttles the producer.

use super::barrier::CompletionToken;
use super::cancel::CancelToken;
use super::message::{ResultItem, ResultSender, WorkItem, WorkReceiver};
use crate::lookup::{LookupClient, LookupStats, RetryingClient};
use crate::types::{FailedLookup, Identifier, LookupResult};
use crossbeam_channel::select;
use std::sync::Arc;
use std::time::Instant;

/// Why a worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Took its stop signal
    Stopped,
    /// Cancellation was requested
    Cancelled,
    /// The work queue closed without a stop signal (producer died)
    WorkQueueClosed,
    /// The result queue closed (writer died)
    ResultQueueClosed,
}

/// What a worker hands back when it exits
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub exit: WorkerExit,
    pub stats: LookupStats,
}

/// One lookup worker
pub struct Worker<C> {
    worker_id: usize,
    work_rx: WorkReceiver,
    result_tx: ResultSender,
    client: Arc<RetryingClient<C>>,
    cancel: CancelToken,
    stats: LookupStats,
    _done: CompletionToken,
}

impl<C: LookupClient> Worker<C> {
    /// Create a worker holding its barrier slot
    pub fn new(
        worker_id: usize,
        work_rx: WorkReceiver,
        result_tx: ResultSender,
        client: Arc<RetryingClient<C>>,
        cancel: CancelToken,
        done: CompletionToken,
    ) -> Self {
        Self {
            worker_id,
            work_rx,
            result_tx,
            client,
            cancel,
            stats: LookupStats::default(),
            _done: done,
        }
    }

    /// Run until stopped; the barrier slot is released when this returns
    pub fn run(mut self) -> WorkerReport {
        tracing::trace!("Worker {} started", self.worker_id);

        let exit = loop {
            let item = select! {
                recv(self.work_rx) -> msg => msg.ok(),
                recv(self.cancel.receiver()) -> _ => break WorkerExit::Cancelled,
            };

            let identifier = match item {
                Some(WorkItem::Lookup(identifier)) => identifier,
                Some(WorkItem::Stop) => break WorkerExit::Stopped,
                None => break WorkerExit::WorkQueueClosed,
            };

            if self.cancel.is_cancelled() {
                break WorkerExit::Cancelled;
            }

            let result = self.process(identifier);

            select! {
                send(self.result_tx, result) -> res => {
                    if res.is_err() {
                        break WorkerExit::ResultQueueClosed;
                    }
                }
                recv(self.cancel.receiver()) -> _ => break WorkerExit::Cancelled,
            }
        };

        match exit {
            WorkerExit::Stopped | WorkerExit::Cancelled => tracing::trace!(
                "Worker {} exiting ({:?}) after {} lookups",
                self.worker_id,
                exit,
                self.stats.completed()
            ),
            WorkerExit::WorkQueueClosed | WorkerExit::ResultQueueClosed => tracing::warn!(
                "Worker {} exiting early ({:?}) after {} lookups",
                self.worker_id,
                exit,
                self.stats.completed()
            ),
        }

        WorkerReport {
            worker_id: self.worker_id,
            exit,
            stats: self.stats.clone(),
        }
    }

    /// Look up one identifier and turn the outcome into a result item
    fn process(&mut self, identifier: Identifier) -> ResultItem {
        let started = Instant::now();
        let outcome = self.client.execute(&identifier);
        let latency = started.elapsed();
        let retries = outcome.retries();
        let attempts = outcome.attempts;

        match outcome.result {
            Ok(category) => {
                self.stats.record_success(latency, retries);
                tracing::debug!("{}\t{}", identifier, category);
                ResultItem::Found(LookupResult::new(identifier, category))
            }
            Err(err) => {
                self.stats.record_failure(latency, retries);
                tracing::warn!(
                    "Lookup for {} failed after {} attempt(s): {}",
                    identifier,
                    attempts,
                    err
                );
                ResultItem::Failed(FailedLookup {
                    identifier,
                    reason: err.to_string(),
                    attempts,
                })
            }
        }
    }
}
