//! Cooperative cancellation
//!
//! Handles and tokens share one slot holding the only sender of a
//! zero-capacity channel that never carries a message. Only
//! [`CancelHandle::cancel`] empties the slot, which disconnects every
//! [`CancelToken`] at once; dropping handles does not. Stages observe this
//! through `crossbeam_channel::select!` at each blocking point, so no thread
//! needs to poll a flag.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Triggers cancellation; cloneable and safe to share across threads
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    token: CancelToken,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    /// Create a new, not yet cancelled handle
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        let sender = Arc::new(Mutex::new(Some(tx)));
        Self {
            token: CancelToken {
                receiver: rx,
                _slot: Arc::clone(&sender),
            },
            sender,
        }
    }

    /// A token observing this handle
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Cancel; idempotent
    pub fn cancel(&self) {
        let mut sender = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if sender.take().is_some() {
            tracing::info!("Cancellation requested");
        }
    }

    /// Whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Observes a [`CancelHandle`]
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: Receiver<()>,
    /// Keeps the sender alive while any token exists
    _slot: Arc<Mutex<Option<Sender<()>>>>,
}

impl CancelToken {
    /// Receiver that becomes ready (disconnected) on cancellation, for use
    /// as a `select!` arm
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `duration`; returns false if cancelled first
    pub fn sleep(&self, duration: Duration) -> bool {
        match self.receiver.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) | Ok(()) => false,
        }
    }
}
