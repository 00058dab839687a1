//! Completion barriers
//!
//! A [`CompletionBarrier`] is a countdown built on
//! `crossbeam_utils::sync::WaitGroup`. Each participating thread holds one
//! [`CompletionToken`]; the count drops exactly once per token, when the
//! token is dropped. That happens on normal return, on early return after an
//! error, and during unwinding after a panic, so a waiting driver can never
//! be left blocked by a stage that died.

use crossbeam_utils::sync::WaitGroup;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Countdown barrier the driver waits on
#[derive(Debug)]
pub struct CompletionBarrier {
    name: &'static str,
    group: WaitGroup,
    remaining: Arc<AtomicUsize>,
}

impl CompletionBarrier {
    /// Create a barrier with no participants yet
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            group: WaitGroup::new(),
            remaining: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register one participant and hand out its token
    pub fn token(&self) -> CompletionToken {
        self.remaining.fetch_add(1, Ordering::SeqCst);
        CompletionToken {
            name: self.name,
            _group: self.group.clone(),
            remaining: Arc::clone(&self.remaining),
        }
    }

    /// Participants that have not finished yet
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }

    /// Block until every token has been released
    pub fn wait(self) {
        tracing::debug!(
            "Waiting on '{}' barrier ({} outstanding)",
            self.name,
            self.remaining()
        );
        self.group.wait();
        tracing::debug!("'{}' barrier released", self.name);
    }
}

/// Held by one participating thread; releases the barrier slot on drop
#[derive(Debug)]
pub struct CompletionToken {
    name: &'static str,
    _group: WaitGroup,
    remaining: Arc<AtomicUsize>,
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        let left = self.remaining.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::trace!("'{}' participant finished, {} left", self.name, left);
    }
}
