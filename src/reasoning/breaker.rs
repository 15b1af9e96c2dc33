//! Per-domain circuit breaker.
//!
//! Lives with the adapter across sessions: consecutive failed calls for a
//! domain open it, and while open the adapter answers with an error proposal
//! without calling out. After the cooldown a single trial call is let through.
//!
//! Every admitted call holds a [`CallPermit`]. A permit dropped without an
//! outcome, as happens when the session deadline aborts the task, counts as a
//! failure so a half-open trial can never stay in flight forever.

use crate::config::CircuitBreakerConfig;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    label: String,
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(label: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            label: label.into(),
            failure_threshold: config.failure_threshold.max(1),
            cooldown: Duration::from_secs(config.cooldown_sec),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic elsewhere never leaves the counters half-written
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Permission to call out, or the time left until the next trial
    pub fn acquire(&self) -> Result<CallPermit<'_>, Duration> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {}
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed < self.cooldown {
                    return Err(self.cooldown - elapsed);
                }
                info!("Circuit for {} half-open, allowing a trial call", self.label);
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
            }
            CircuitState::HalfOpen if inner.trial_in_flight => return Err(Duration::ZERO),
            CircuitState::HalfOpen => inner.trial_in_flight = true,
        }
        Ok(CallPermit {
            breaker: self,
            settled: false,
        })
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!("Circuit for {} closed after successful trial", self.label);
        }
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        inner.trial_in_flight = false;
        match inner.state {
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.failure_threshold {
                    warn!(
                        "Circuit for {} opening after {} consecutive failures",
                        self.label, inner.failures
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!("Circuit for {} re-opening after failed trial", self.label);
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Open => {}
        }
    }
}

/// One admitted call. Settle it with [`CallPermit::succeed`] or
/// [`CallPermit::fail`]; dropping it unsettled records a failure.
#[must_use]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                "Call for {} abandoned before it finished, counting it as failed",
                self.breaker.label
            );
            self.breaker.record_failure();
        }
    }
}
