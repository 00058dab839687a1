//! Error handling for enrich-rs
//!
//! This module defines the crate-wide error type and a Result alias used by
//! every pipeline stage. Lookup failures have their own narrower type in
//! [`crate::lookup::LookupError`] and never become an [`EnrichError`]: a
//! worker turns them into a failed result instead.

use thiserror::Error;

/// Main error type for enrich-rs operations
#[derive(Error, Debug)]
pub enum EnrichError {
    /// The identifier source could not be read (fatal to the producer stage)
    #[error("Source read error: {0}")]
    SourceRead(String),

    /// Output could not be persisted (fatal to the writer stage)
    #[error("Sink write error: {0}")]
    SinkWrite(String),

    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// The run was cancelled before all input was consumed
    #[error("Run cancelled")]
    Cancelled,

    /// A stage thread panicked
    #[error("Stage '{0}' panicked")]
    StagePanicked(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EnrichError>,
    },
}

impl EnrichError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EnrichError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &EnrichError {
        match self {
            EnrichError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<csv::Error> for EnrichError {
    fn from(err: csv::Error) -> Self {
        EnrichError::SourceRead(err.to_string())
    }
}

/// Result type alias for enrich-rs operations
pub type Result<T> = std::result::Result<T, EnrichError>;
