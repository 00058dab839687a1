//! Lookup client for the remote per-identifier service
//!
//! Every worker owns a handle to a shared [`LookupClient`]. A call performs
//! one outbound request keyed by the identifier and maps the response to a
//! normalized [`Category`] or a [`LookupError`].
//!
//! # Components
//!
//! - [`LookupClient`] - Trait implemented by the real HTTP client and test doubles
//! - [`HttpLookupClient`] - Blocking HTTP implementation built on `ureq`
//! - [`RetryingClient`] - Wraps any client with bounded exponential-backoff retry
//! - [`LookupStats`] - Per-worker success/failure/latency accounting
//! - [`OfflineLookupClient`] - Deterministic client needing no network (feature-gated)
//!
//! # Example
//!
//! ```ignore
//! use enrich_rs::lookup::{HttpLookupClient, RetryingClient, RetryPolicy};
//!
//! let http = HttpLookupClient::from_config(&config.lookup);
//! let client = RetryingClient::new(http, RetryPolicy::from_config(&config.lookup.retry));
//! let category = client.lookup(&"tt0111161".into())?;
//! ```

pub mod http;
#[cfg(feature = "mock-lookup")]
pub mod offline;
pub mod retry;
pub mod stats;

pub use http::HttpLookupClient;
#[cfg(feature = "mock-lookup")]
pub use offline::OfflineLookupClient;
pub use retry::{RetryPolicy, RetryingClient};
pub use stats::LookupStats;

use crate::types::{Category, Identifier};
use std::sync::Arc;
use thiserror::Error;

/// Errors produced by a single lookup call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Network failure, timeout, throttling, or server error; worth retrying
    #[error("transient lookup failure: {0}")]
    Transient(String),

    /// Malformed response or client error; retrying will not help
    #[error("permanent lookup failure: {0}")]
    Permanent(String),

    /// A transient failure that persisted through every allowed attempt
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl LookupError {
    /// Whether the call may succeed if repeated
    pub fn is_transient(&self) -> bool {
        matches!(self, LookupError::Transient(_))
    }
}

/// Unified interface for lookup services
///
/// Implementations are shared by all workers, so they must be `Send + Sync`
/// and take `&self`.
#[cfg_attr(test, mockall::automock)]
pub trait LookupClient: Send + Sync {
    /// Look up one identifier and return its normalized category
    fn lookup(&self, identifier: &Identifier) -> Result<Category, LookupError>;
}

impl<T: LookupClient + ?Sized> LookupClient for Arc<T> {
    fn lookup(&self, identifier: &Identifier) -> Result<Category, LookupError> {
        (**self).lookup(identifier)
    }
}

impl<T: LookupClient + ?Sized> LookupClient for Box<T> {
    fn lookup(&self, identifier: &Identifier) -> Result<Category, LookupError> {
        (**self).lookup(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LookupError::Transient("timeout".into()).is_transient());
        assert!(!LookupError::Permanent("bad json".into()).is_transient());
        assert!(!LookupError::Exhausted {
            attempts: 5,
            last: "timeout".into()
        }
        .is_transient());
    }

    #[test]
    fn test_arc_forwards_to_inner_client() {
        let mut mock = MockLookupClient::new();
        mock.expect_lookup()
            .times(1)
            .returning(|_| Ok(Category::normalize(Some("France"))));

        let shared: Arc<dyn LookupClient> = Arc::new(mock);
        let category = shared.lookup(&"tt1".into()).unwrap();
        assert_eq!(category.as_str(), "France");
    }
}
