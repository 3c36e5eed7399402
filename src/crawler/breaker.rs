//! Failure-detecting circuit breaker
//!
//! Every physical fetch attempt reports exactly once. The breaker opens when
//! either trigger fires:
//!
//! - `consecutive_failures >= threshold`
//! - `total_requests >= min_requests` and `total_failures / total_requests >= failure_rate`
//!
//! Once open it stays open for the rest of the run.

use crate::config::CircuitBreakerConfig;
use crate::CircuitOpenError;
use std::fmt;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
        }
    }
}

/// Point-in-time copy of the breaker counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_failures: u64,
}

impl BreakerSnapshot {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            total_requests: 0,
            total_failures: 0,
        }
    }

    /// Fraction of attempts that failed, 0.0 before any request
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_requests as f64
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == BreakerState::Open
    }
}

/// Shared breaker; all updates happen inside one critical section
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerSnapshot>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerSnapshot::new()),
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.total_requests += 1;
        inner.consecutive_failures = 0;
        self.evaluate(&mut inner);
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.total_requests += 1;
        inner.total_failures += 1;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        self.evaluate(&mut inner);
    }

    /// Returns false once the breaker has opened; always true when disabled
    pub fn allow_request(&self) -> bool {
        !self.config.enabled || !self.lock().is_open()
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        *self.lock()
    }

    /// Like [`allow_request`](Self::allow_request), carrying the counters on refusal
    pub fn check(&self) -> Result<(), CircuitOpenError> {
        if self.allow_request() {
            Ok(())
        } else {
            Err(CircuitOpenError {
                snapshot: self.snapshot(),
            })
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evaluate(&self, inner: &mut BreakerSnapshot) {
        if !self.config.enabled || inner.is_open() {
            return;
        }

        let consecutive_tripped = inner.consecutive_failures >= self.config.threshold;
        // A run without failures never trips the rate, even at failure-rate 0.0
        let rate_tripped = inner.total_failures > 0
            && inner.total_requests >= u64::from(self.config.min_requests)
            && inner.failure_rate() >= self.config.failure_rate;

        if consecutive_tripped || rate_tripped {
            inner.state = BreakerState::Open;
            tracing::warn!(
                "Circuit breaker opened: {} consecutive failures, {}/{} failed ({:.0}%)",
                inner.consecutive_failures,
                inner.total_failures,
                inner.total_requests,
                inner.failure_rate() * 100.0
            );
        }
    }
}
