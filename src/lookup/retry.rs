//! Bounded retry with exponential backoff
//!
//! Only [`LookupError::Transient`] failures are retried. Once the attempt cap
//! is reached the last transient error is demoted to
//! [`LookupError::Exhausted`], which callers treat as permanent.

use super::{LookupClient, LookupError};
use crate::config::RetryConfig;
use crate::pipeline::cancel::CancelToken;
use crate::types::{Category, Identifier};
use std::time::Duration;

/// Retry schedule for a single lookup
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts, first try included (at least 1)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound on a single delay
    pub max_backoff: Duration,
    /// Growth factor between delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Build a policy from config
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier.max(1.0),
        }
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::immediate(1)
    }

    /// A policy that retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

/// Outcome of a retried lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted {
    pub result: Result<Category, LookupError>,
    /// Attempts actually made (1 when the first try settled it)
    pub attempts: u32,
}

impl Attempted {
    /// Number of retries beyond the first attempt
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Wraps a client with a [`RetryPolicy`]
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
    cancel: Option<CancelToken>,
}

impl<C: LookupClient> RetryingClient<C> {
    /// Wrap `inner` with `policy`
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            cancel: None,
        }
    }

    /// Abort backoff sleeps when `cancel` fires
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The active retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Look up `identifier`, retrying transient failures
    pub fn execute(&self, identifier: &Identifier) -> Attempted {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.lookup(identifier) {
                Ok(category) => {
                    return Attempted {
                        result: Ok(category),
                        attempts: attempt,
                    }
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        "Lookup for {} failed (attempt {}/{}), retrying in {:?}: {}",
                        identifier,
                        attempt,
                        max_attempts,
                        delay,
                        err
                    );
                    if !self.backoff(delay) {
                        return Attempted {
                            result: Err(err),
                            attempts: attempt,
                        };
                    }
                    attempt += 1;
                }
                Err(LookupError::Transient(last)) => {
                    return Attempted {
                        result: Err(LookupError::Exhausted {
                            attempts: attempt,
                            last,
                        }),
                        attempts: attempt,
                    }
                }
                Err(err) => {
                    return Attempted {
                        result: Err(err),
                        attempts: attempt,
                    }
                }
            }
        }
    }

    /// Sleep for `delay`; returns false if cancelled first
    fn backoff(&self, delay: Duration) -> bool {
        match self.cancel {
            Some(ref cancel) => cancel.sleep(delay),
            None => {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                true
            }
        }
    }
}

impl<C: LookupClient> LookupClient for RetryingClient<C> {
    fn lookup(&self, identifier: &Identifier) -> Result<Category, LookupError> {
        self.execute(identifier).result
    }
}
