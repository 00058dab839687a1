//! Scripted lookup clients and instrumented sources

use crossbeam_channel::{bounded, Receiver, Sender};
use enrich_rs::{Category, EnrichError, Identifier, LookupClient, LookupError, Result};
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Client backed by a closure
pub struct FnClient<F>(F);

impl<F> FnClient<F>
where
    F: Fn(&Identifier) -> std::result::Result<Category, LookupError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> LookupClient for FnClient<F>
where
    F: Fn(&Identifier) -> std::result::Result<Category, LookupError> + Send + Sync,
{
    fn lookup(&self, identifier: &Identifier) -> std::result::Result<Category, LookupError> {
        (self.0)(identifier)
    }
}

/// Category derived from the numeric suffix of the identifier, modulo `buckets`
pub fn bucket_client(
    buckets: u64,
) -> FnClient<impl Fn(&Identifier) -> std::result::Result<Category, LookupError> + Send + Sync> {
    FnClient::new(move |id: &Identifier| {
        let n: u64 = id.as_str().trim_start_matches("tt").parse().unwrap_or(0);
        Ok(Category::normalize(Some(&format!("C{}", n % buckets))))
    })
}

/// Client that blocks every lookup until the gate is opened
pub struct GatedClient {
    gate: Receiver<()>,
    calls: Arc<AtomicU64>,
}

/// Opens a [`GatedClient`] when dropped or when `open` is called
pub struct Gate {
    sender: Mutex<Option<Sender<()>>>,
}

impl Gate {
    pub fn open(&self) {
        self.sender.lock().unwrap().take();
    }
}

impl GatedClient {
    pub fn new() -> (Self, Gate, Arc<AtomicU64>) {
        let (tx, rx) = bounded(0);
        let calls = Arc::new(AtomicU64::new(0));
        (
            Self {
                gate: rx,
                calls: Arc::clone(&calls),
            },
            Gate {
                sender: Mutex::new(Some(tx)),
            },
            calls,
        )
    }
}

impl LookupClient for GatedClient {
    fn lookup(&self, _identifier: &Identifier) -> std::result::Result<Category, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.gate.recv();
        Ok(Category::normalize(Some("USA")))
    }
}

/// Client that fails transiently on the first attempt for every identifier
pub struct FlakyClient {
    seen: Mutex<HashSet<Identifier>>,
}

impl FlakyClient {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }
}

impl LookupClient for FlakyClient {
    fn lookup(&self, identifier: &Identifier) -> std::result::Result<Category, LookupError> {
        if self.seen.lock().unwrap().insert(identifier.clone()) {
            Err(LookupError::Transient("HTTP 503".to_string()))
        } else {
            Ok(Category::normalize(Some("France")))
        }
    }
}

/// Source that counts how many items have been pulled from it
pub struct CountingSource {
    items: std::vec::IntoIter<Result<Identifier>>,
    pulled: Arc<AtomicU64>,
}

impl CountingSource {
    pub fn new(items: Vec<Result<Identifier>>) -> (Self, Arc<AtomicU64>) {
        let pulled = Arc::new(AtomicU64::new(0));
        (
            Self {
                items: items.into_iter(),
                pulled: Arc::clone(&pulled),
            },
            pulled,
        )
    }
}

impl Iterator for CountingSource {
    type Item = Result<Identifier>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.next()?;
        self.pulled.fetch_add(1, Ordering::SeqCst);
        Some(item)
    }
}

/// `good` identifiers followed by a read error
pub fn failing_source(good: usize) -> Vec<Result<Identifier>> {
    let mut items = super::builders::identifiers(good);
    items.push(Err(EnrichError::SourceRead("device gone".to_string())));
    items.push(Ok(Identifier::new("after-error")));
    items
}

/// Writer that always fails
pub struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }
}
