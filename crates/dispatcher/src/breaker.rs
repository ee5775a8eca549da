//! Circuit breaker over consecutive failed batches
//!
//! `Closed` → `Open` after `failure_threshold` batches in a row fail
//! permanently. While open, dispatch waits out the cool-down; the next batch
//! is the half-open probe. Success closes the breaker, failure reopens it.

use std::time::Duration;

use contracts::BreakerConfig;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { until: Instant },
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cool_down: Duration,
    consecutive_failures: u32,
    state: BreakerState,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            threshold: config.failure_threshold,
            cool_down: config.cool_down(),
            consecutive_failures: 0,
            state: BreakerState::Closed,
        }
    }

    /// Breaker that never opens
    pub fn disabled() -> Self {
        Self::new(&BreakerConfig {
            failure_threshold: 0,
            cool_down_ms: 0,
        })
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Instant dispatch may resume, when open
    pub fn open_until(&self) -> Option<Instant> {
        match self.state {
            BreakerState::Open { until } => Some(until),
            _ => None,
        }
    }

    /// Cool-down elapsed; let the next batch probe
    pub fn half_open(&mut self) {
        if matches!(self.state, BreakerState::Open { .. }) {
            self.state = BreakerState::HalfOpen;
        }
    }

    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = BreakerState::Closed;
    }

    /// Record a permanently failed batch; returns true when this opened the breaker
    pub fn on_failure(&mut self, now: Instant) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.threshold == 0 {
            return false;
        }

        let trip = match self.state {
            BreakerState::HalfOpen => true,
            BreakerState::Closed => self.consecutive_failures >= self.threshold,
            BreakerState::Open { .. } => false,
        };
        if trip {
            self.state = BreakerState::Open {
                until: now + self.cool_down,
            };
        }
        trip
    }
}
