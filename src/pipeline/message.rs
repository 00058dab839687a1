//! Queue element types
//!
//! End-of-stream is a dedicated variant rather than a reserved identifier
//! string, so no input value can be mistaken for a stop signal.

use crate::types::{FailedLookup, Identifier, LookupResult};
use crossbeam_channel::{bounded, Receiver, Sender};

/// Element of the work queue (producer -> workers)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// An identifier to look up
    Lookup(Identifier),
    /// No more work; exactly one is sent per worker
    Stop,
}

/// Element of the result queue (workers -> writer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultItem {
    /// A successful lookup
    Found(LookupResult),
    /// A lookup that failed after retries
    Failed(FailedLookup),
    /// No more results; sent once by the driver after every worker exits
    Stop,
}

/// Work queue endpoints
pub type WorkSender = Sender<WorkItem>;
pub type WorkReceiver = Receiver<WorkItem>;

/// Result queue endpoints
pub type ResultSender = Sender<ResultItem>;
pub type ResultReceiver = Receiver<ResultItem>;

/// Create the bounded work queue
pub fn work_queue(capacity: usize) -> (WorkSender, WorkReceiver) {
    bounded(capacity.max(1))
}

/// Create the bounded result queue
pub fn result_queue(capacity: usize) -> (ResultSender, ResultReceiver) {
    bounded(capacity.max(1))
}
