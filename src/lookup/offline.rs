//! Offline lookup client for exercising the pipeline without the service
//!
//! Categories are derived from a hash of the identifier, so repeated runs
//! over the same input produce the same output. Latency and periodic
//! failures can be injected to observe backpressure and retry behavior.
//!
//! # Enabling
//!
//! Only available with the `mock-lookup` feature:
//!
//! ```bash
//! cargo run --features mock-lookup -- --offline --input movies.tsv ...
//! ```

use super::{LookupClient, LookupError};
use crate::types::{Category, Identifier};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Categories handed out by default
const DEFAULT_CATEGORIES: &[&str] = &["USA", "UK", "France", "Japan", "India", "N/A"];

/// Deterministic lookup client
#[derive(Debug, Clone)]
pub struct OfflineLookupClient {
    categories: Vec<String>,
    latency: Duration,
    /// Every n-th identifier (by hash) fails transiently; 0 disables
    transient_every: u64,
}

impl Default for OfflineLookupClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineLookupClient {
    /// Create a client with the default category list and no latency
    pub fn new() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            latency: Duration::ZERO,
            transient_every: 0,
        }
    }

    /// Replace the category list
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    /// Sleep this long per lookup
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail transiently for every n-th identifier hash
    pub fn with_transient_every(mut self, n: u64) -> Self {
        self.transient_every = n;
        self
    }

    fn hash_of(identifier: &Identifier) -> u64 {
        let mut hasher = DefaultHasher::new();
        identifier.hash(&mut hasher);
        hasher.finish()
    }
}

impl LookupClient for OfflineLookupClient {
    fn lookup(&self, identifier: &Identifier) -> Result<Category, LookupError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let hash = Self::hash_of(identifier);
        if self.transient_every > 0 && hash % self.transient_every == 0 {
            return Err(LookupError::Transient("injected failure".to_string()));
        }

        if self.categories.is_empty() {
            return Ok(Category::null());
        }
        let index = (hash % self.categories.len() as u64) as usize;
        Ok(Category::normalize(Some(&self.categories[index])))
    }
}
