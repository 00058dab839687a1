//! # enrich-rs: bounded-concurrency identifier enrichment
//!
//! Reads identifiers from a tab-separated file, looks each one up against a
//! remote per-identifier service, and persists `<identifier>\t<category>`
//! records plus the deduplicated set of categories seen.
//!
//! ## Architecture
//!
//! - **Source**: lazy TSV reader yielding identifiers
//! - **Pipeline**: one producer, a fixed pool of lookup workers and one writer,
//!   connected by bounded crossbeam queues and two completion barriers
//! - **Lookup**: blocking HTTP client (ureq) behind the [`lookup::LookupClient`]
//!   trait, wrapped in bounded exponential-backoff retry
//! - **Sinks**: buffered append-only line writers owned by the writer stage
//!
//! ## Configuration
//!
//! Runs are configured through a TOML file (see [`config::EnrichConfig`]),
//! environment variables and command line flags, in increasing precedence.
//!
//! ## Example
//!
//! ```ignore
//! use enrich_rs::{
//!     config::EnrichConfig,
//!     lookup::HttpLookupClient,
//!     pipeline::Pipeline,
//!     sink::Outputs,
//!     source::TsvSource,
//! };
//!
//! fn main() -> enrich_rs::Result<()> {
//!     let mut config = EnrichConfig::load("enrich.toml")?;
//!     config.apply_env();
//!     config.validate()?;
//!
//!     let client = HttpLookupClient::from_config(&config.lookup);
//!     let source = TsvSource::open(&config.source)?;
//!     let outputs = Outputs::open(&config.output)?;
//!
//!     let report = Pipeline::from_config(&config, client).run(source, outputs)?;
//!     report.log_summary();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod lookup;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use config::{EnrichConfig, FailurePolicy};
pub use error::{EnrichError, Result};
pub use lookup::{HttpLookupClient, LookupClient, LookupError, RetryPolicy};
pub use pipeline::{CancelHandle, Pipeline, RunOutcome, RunReport};
pub use sink::{LineSink, Outputs};
pub use source::TsvSource;
pub use types::{Category, Identifier, LookupResult};
