//! Producer / worker pool / writer pipeline.
//!
//! Identifiers flow through two bounded crossbeam queues. Memory stays
//! bounded by the queue capacities no matter how large the input is, and a
//! slow lookup service throttles the producer through backpressure.
//!
//! # Architecture
//!
//! ```text
//!                       ┌──► [Worker 0] ──┐
//! [Producer] ──► work ──┼──► [Worker 1] ──┼──► results ──► [Writer] ──► records
//!   (source)    queue   └──► [Worker N] ──┘     queue          └──────► summary set
//! ```
//!
//! # Design
//!
//! - **Typed stop signals**: `WorkItem::Stop` / `ResultItem::Stop`, one per
//!   worker on the work queue and exactly one on the result queue.
//! - **Two completion barriers**: the driver sends the result stop only after
//!   every worker released the `workers` barrier, and touches the sinks only
//!   after the writer released the `writer` barrier.
//! - **Single writer**: the writer owns the sinks and the summary set, so
//!   neither needs a lock.
//! - **Cancellation**: every blocking point selects on a [`CancelToken`].

pub mod barrier;
pub mod cancel;
pub mod driver;
pub mod message;
pub mod producer;
pub mod report;
pub mod summary;
pub mod worker;
pub mod writer;

pub use barrier::{CompletionBarrier, CompletionToken};
pub use cancel::{CancelHandle, CancelToken};
pub use driver::Pipeline;
pub use message::{ResultItem, WorkItem};
pub use producer::{Producer, ProducerReport};
pub use report::{RunOutcome, RunReport};
pub use summary::SummarySet;
pub use worker::{Worker, WorkerExit, WorkerReport};
pub use writer::{Writer, WriterOutcome};
