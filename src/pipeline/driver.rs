//! Pipeline driver
//!
//! Starts the producer, the worker pool and the writer on named threads,
//! then runs the shutdown handshake:
//!
//! 1. wait until every worker has released the `workers` barrier
//! 2. push the single [`ResultItem::Stop`] onto the result queue
//! 3. wait until the writer has released the `writer` barrier
//! 4. close the sinks and persist the summary set
//!
//! The result stop must not be sent before step 1 completes, otherwise the
//! writer could exit while a late result is still in flight.

use super::barrier::CompletionBarrier;
use super::cancel::{CancelHandle, CancelToken};
use super::message::{result_queue, work_queue, ResultItem, ResultSender};
use super::producer::Producer;
use super::report::{RunOutcome, RunReport};
use super::worker::{Worker, WorkerReport};
use super::writer::{Writer, WriterOutcome};
use crate::config::{EnrichConfig, PipelineConfig, DEFAULT_PROGRESS_INTERVAL};
use crate::error::{EnrichError, Result};
use crate::lookup::{LookupClient, LookupStats, RetryPolicy, RetryingClient};
use crate::sink::{LineSink, Outputs};
use crate::types::Identifier;
use crossbeam_channel::select;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Three-stage enrichment pipeline
pub struct Pipeline<C> {
    config: PipelineConfig,
    client: C,
    retry: RetryPolicy,
    progress_interval: u64,
    cancel: CancelHandle,
    skipped: Option<Arc<AtomicU64>>,
}

impl<C: LookupClient + 'static> Pipeline<C> {
    /// Create a pipeline with the default retry policy
    pub fn new(config: PipelineConfig, client: C) -> Self {
        Self {
            config,
            client,
            retry: RetryPolicy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            cancel: CancelHandle::new(),
            skipped: None,
        }
    }

    /// Create a pipeline from a full run configuration
    pub fn from_config(config: &EnrichConfig, client: C) -> Self {
        Self::new(config.pipeline.clone(), client)
            .with_retry_policy(RetryPolicy::from_config(&config.lookup.retry))
            .with_progress_interval(config.output.progress_interval)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Use an externally owned cancel handle
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Counter of input records the source skipped, read into the report
    pub fn with_skip_counter(mut self, skipped: Arc<AtomicU64>) -> Self {
        self.skipped = Some(skipped);
        self
    }

    /// Handle that cancels this pipeline once it runs
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run to completion
    ///
    /// Shorthand for [`Pipeline::execute`] that keeps the report only when
    /// the run succeeded.
    pub fn run<S>(self, source: S, outputs: Outputs) -> Result<RunReport>
    where
        S: IntoIterator<Item = Result<Identifier>> + Send + 'static,
    {
        self.execute(source, outputs).into_result()
    }

    /// Run to completion, returning the report even when the run failed
    ///
    /// Every stage is joined before this returns, whatever the outcome. A
    /// sink failure is reported without persisting the summary. Otherwise
    /// the summary is persisted and the first of these is reported: a
    /// source failure, a panicked stage, a thread spawn failure,
    /// cancellation.
    pub fn execute<S>(self, source: S, outputs: Outputs) -> RunOutcome
    where
        S: IntoIterator<Item = Result<Identifier>> + Send + 'static,
    {
        let mut report = RunReport::started(self.config.worker_count);
        if let Err(err) = self.config.validate() {
            return RunOutcome::failed(report, err);
        }

        let Pipeline {
            config,
            client,
            retry,
            progress_interval,
            cancel,
            skipped,
        } = self;

        let started = Instant::now();
        let token = cancel.token();

        let (work_tx, work_rx) = work_queue(config.work_queue_capacity);
        let (result_tx, result_rx) = result_queue(config.result_queue_capacity);
        let workers_done = CompletionBarrier::new("workers");
        let writer_done = CompletionBarrier::new("writer");
        let client = Arc::new(RetryingClient::new(client, retry).with_cancel(token.clone()));

        tracing::info!(
            "Starting pipeline: {} workers, queue capacity {}/{}, {} attempts, failure policy {}",
            config.worker_count,
            config.work_queue_capacity,
            config.result_queue_capacity,
            client.policy().max_attempts,
            config.failure_policy
        );

        let Outputs {
            records,
            summary: summary_sink,
            failures,
        } = outputs;

        let mut spawn_error = None;

        let producer = Producer::new(work_tx, config.worker_count, token.clone());
        let producer_handle = spawn_stage(
            "enrich-producer".to_string(),
            &cancel,
            &mut spawn_error,
            move || producer.run(source),
        );

        let mut worker_handles = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let worker = Worker::new(
                worker_id,
                work_rx.clone(),
                result_tx.clone(),
                Arc::clone(&client),
                token.clone(),
                workers_done.token(),
            );
            let handle = spawn_stage(
                format!("enrich-worker-{worker_id}"),
                &cancel,
                &mut spawn_error,
                move || worker.run(),
            );
            match handle {
                Some(handle) => worker_handles.push(handle),
                None => break,
            }
        }
        // Workers hold the only receivers, so the producer sees a closed
        // queue if they all die.
        drop(work_rx);

        let writer = Writer::new(
            result_rx,
            records,
            failures,
            config.failure_policy,
            token.clone(),
            writer_done.token(),
        )
        .with_progress_interval(progress_interval);
        let writer_handle = spawn_stage(
            "enrich-writer".to_string(),
            &cancel,
            &mut spawn_error,
            move || writer.run(),
        );

        signal_results_done(workers_done, result_tx, &token);
        writer_done.wait();

        let mut panicked = Vec::new();

        let producer_result = producer_handle
            .and_then(|h| join_stage(h, "producer", &mut panicked));
        let mut stats = LookupStats::default();
        for handle in worker_handles {
            if let Some(WorkerReport { stats: worker_stats, .. }) =
                join_stage(handle, "worker", &mut panicked)
            {
                stats.merge(&worker_stats);
            }
        }
        let writer_result = writer_handle.map(|h| join_stage(h, "writer", &mut panicked));

        if let Some(Ok(produced)) = &producer_result {
            report.identifiers_read = produced.identifiers_sent;
            report.stops_sent = produced.stops_sent;
        }
        if let Some(ref counter) = skipped {
            report.records_skipped = counter.load(Ordering::SeqCst);
        }
        report.record_lookups(&stats);

        let sink_error = match writer_result {
            Some(Some(Ok(outcome))) => {
                report.cancelled = outcome.cancelled;
                finish_outputs(outcome, summary_sink, &mut report).err()
            }
            Some(Some(Err(err))) => {
                tracing::error!("Writer failed, summary not persisted: {}", err);
                Some(err)
            }
            Some(None) => Some(EnrichError::StagePanicked("writer".to_string())),
            None => Some(
                spawn_error
                    .take()
                    .unwrap_or_else(|| EnrichError::Channel("writer not started".to_string())),
            ),
        };

        report.cancelled |= token.is_cancelled();
        report.elapsed_ms = started.elapsed().as_millis().min(u64::MAX as u128) as u64;
        report.log_summary();

        if let Some(err) = sink_error {
            return RunOutcome::failed(report, err);
        }

        // Cancellation and closed-queue errors from the producer are
        // symptoms; report their cause first.
        let producer_error = match producer_result {
            Some(Err(err)) if matches!(err.root(), EnrichError::Cancelled | EnrichError::Channel(_)) => {
                Some(err)
            }
            Some(Err(err)) => return RunOutcome::failed(report, err),
            _ => None,
        };
        if let Some(stage) = panicked.into_iter().next() {
            return RunOutcome::failed(report, EnrichError::StagePanicked(stage));
        }
        if let Some(err) = spawn_error {
            return RunOutcome::failed(report, err);
        }
        if report.cancelled {
            return RunOutcome::failed(report, EnrichError::Cancelled);
        }
        if let Some(err) = producer_error {
            return RunOutcome::failed(report, err);
        }

        RunOutcome::succeeded(report)
    }
}

/// Send the single result stop once every worker has finished
///
/// Blocks on the `workers` barrier first, so the stop lands behind every
/// result a worker pushed. Gives up if the writer is gone or the run is
/// cancelled. Returns whether the stop was queued.
fn signal_results_done(
    workers_done: CompletionBarrier,
    result_tx: ResultSender,
    token: &CancelToken,
) -> bool {
    workers_done.wait();

    let sent = select! {
        send(result_tx, ResultItem::Stop) -> res => res.is_ok(),
        recv(token.receiver()) -> _ => false,
    };
    if !sent {
        tracing::debug!("Result stop not delivered");
    }
    sent
}

/// Close the sinks and persist the summary set
fn finish_outputs(
    outcome: WriterOutcome,
    mut summary_sink: LineSink,
    report: &mut RunReport,
) -> Result<()> {
    let WriterOutcome {
        records,
        failures,
        summary,
        found,
        failed,
        ..
    } = outcome;
    tracing::debug!("Writer handled {} found / {} failed results", found, failed);

    report.distinct_categories = summary.len();
    report.records_written = records.close()?;
    if let Some(failures) = failures {
        report.failures_written = failures.close()?;
    }
    summary.persist(&mut summary_sink)?;
    summary_sink.close()?;
    Ok(())
}

/// Spawn a named stage thread; on failure cancel the run and remember the error
fn spawn_stage<T, F>(
    name: String,
    cancel: &CancelHandle,
    spawn_error: &mut Option<EnrichError>,
    f: F,
) -> Option<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match thread::Builder::new().name(name.clone()).spawn(f) {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::error!("Failed to spawn {}: {}", name, err);
            cancel.cancel();
            spawn_error.get_or_insert(EnrichError::Io(err).with_context(format!("spawning {name}")));
            None
        }
    }
}

/// Join a stage thread, recording its name if it panicked
fn join_stage<T>(handle: JoinHandle<T>, stage: &str, panicked: &mut Vec<String>) -> Option<T> {
    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::error!("{} thread panicked", stage);
            panicked.push(stage.to_string());
            None
        }
    }
}
