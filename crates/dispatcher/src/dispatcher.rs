//! Dispatcher - single worker writing batches to the log appender
//!
//! Batches are dispatched strictly in arrival order. Each one yields exactly
//! one `DispatchOutcome` after the retry policy succeeds or is exhausted.

use std::sync::Arc;
use std::time::Instant as StdInstant;

use contracts::{Batch, BridgeConfig, DispatchOutcome, LogAppender};
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::breaker::CircuitBreaker;
use crate::error::DispatcherError;
use crate::metrics::{DispatcherMetrics, DispatcherSnapshot};
use crate::retry::RetryPolicy;

/// Retrying, breaker-guarded batch writer
pub struct Dispatcher<A: LogAppender> {
    appender: A,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    metrics: Arc<DispatcherMetrics>,
    /// Failed batches in a row that escalate (0 = never)
    max_consecutive_failures: u32,
    consecutive_failures: u32,
    /// Cancelled on escalation so upstream stages stop
    escalation: CancellationToken,
}

impl<A: LogAppender> Dispatcher<A> {
    pub fn new(appender: A, config: &BridgeConfig) -> Self {
        Self {
            appender,
            retry: RetryPolicy::new(&config.retry),
            breaker: CircuitBreaker::new(&config.breaker),
            metrics: Arc::new(DispatcherMetrics::new()),
            max_consecutive_failures: config.lifecycle.max_consecutive_failures,
            consecutive_failures: 0,
            escalation: CancellationToken::new(),
        }
    }

    /// Replace retry policy and breaker (tests, custom wiring)
    pub fn with_policy(mut self, retry: RetryPolicy, breaker: CircuitBreaker) -> Self {
        self.retry = retry;
        self.breaker = breaker;
        self
    }

    /// Cancel `token` once `max_consecutive_failures` batches in a row fail
    pub fn with_escalation(
        mut self,
        max_consecutive_failures: u32,
        token: CancellationToken,
    ) -> Self {
        self.max_consecutive_failures = max_consecutive_failures;
        self.escalation = token;
        self
    }

    pub fn metrics(&self) -> Arc<DispatcherMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn appender(&self) -> &A {
        &self.appender
    }

    /// Write one batch, retrying per policy
    #[instrument(
        name = "dispatcher_dispatch",
        skip(self, batch),
        fields(appender = %self.appender.name(), seq = batch.sequence, size = batch.len())
    )]
    pub async fn dispatch(&mut self, batch: &Batch) -> DispatchOutcome {
        self.wait_for_breaker().await;

        let started = StdInstant::now();
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        let mut outcome = loop {
            attempt += 1;
            self.metrics.inc_attempts();
            observability::record_dispatch_attempt(self.appender.name());

            match self.appender.append(batch).await {
                Ok(ack) => break DispatchOutcome::succeeded(batch, ack.detail, attempt),
                Err(e) => {
                    warn!(
                        endpoint = %self.appender.endpoint(),
                        size = batch.len(),
                        attempt,
                        max_attempts,
                        kind = e.kind(),
                        error = %e,
                        "Dispatch attempt failed"
                    );
                    if attempt >= max_attempts {
                        break DispatchOutcome::failed(batch, e.to_string(), attempt);
                    }
                    sleep(self.retry.backoff(attempt)).await;
                }
            }
        };

        let elapsed = started.elapsed();
        let latency_ms = elapsed.as_secs_f64() * 1000.0;
        outcome.latency_ms = elapsed.as_millis() as u64;
        observability::record_dispatch_outcome(self.appender.name(), &outcome, latency_ms);

        if outcome.success {
            self.metrics.inc_succeeded(outcome.item_count);
            self.breaker.on_success();
            debug!(attempts = outcome.attempts, latency_ms, "Batch written");
        } else {
            self.metrics.inc_failed(outcome.item_count);
            error!(
                endpoint = %self.appender.endpoint(),
                size = batch.len(),
                attempts = outcome.attempts,
                detail = %outcome.detail,
                "Batch failed permanently"
            );
            if self.breaker.on_failure(Instant::now()) {
                self.metrics.inc_breaker_opens();
                observability::record_breaker_open(self.appender.name(), true);
                warn!(endpoint = %self.appender.endpoint(), "Circuit breaker opened");
            }
        }

        outcome
    }

    async fn wait_for_breaker(&mut self) {
        if let Some(until) = self.breaker.open_until() {
            info!(
                endpoint = %self.appender.endpoint(),
                wait_ms = until.saturating_duration_since(Instant::now()).as_millis() as u64,
                "Circuit open, pausing dispatch"
            );
            sleep_until(until).await;
            self.breaker.half_open();
            observability::record_breaker_open(self.appender.name(), false);
        }
    }

    /// Dispatch every batch from `rx` until it closes, publishing outcomes
    ///
    /// Keeps draining after escalation; the escalation error is returned once
    /// the queue is empty.
    #[instrument(name = "dispatcher_run", skip_all, fields(appender = %self.appender.name()))]
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<Batch>,
        outcomes: mpsc::Sender<DispatchOutcome>,
    ) -> Result<DispatcherSnapshot, DispatcherError> {
        info!(endpoint = %self.appender.endpoint(), "Dispatcher started");
        let mut escalated: Option<DispatcherError> = None;

        while let Some(batch) = rx.recv().await {
            self.metrics.set_queue_len(rx.len());
            let outcome = self.dispatch(&batch).await;

            if outcome.success {
                self.consecutive_failures = 0;
            } else {
                self.consecutive_failures += 1;
                if escalated.is_none()
                    && self.max_consecutive_failures > 0
                    && self.consecutive_failures >= self.max_consecutive_failures
                {
                    error!(
                        count = self.consecutive_failures,
                        "Too many consecutive failures, shutting down"
                    );
                    escalated = Some(DispatcherError::ConsecutiveFailures {
                        count: self.consecutive_failures,
                        last_error: outcome.detail.clone(),
                    });
                    self.escalation.cancel();
                }
            }

            if outcomes.send(outcome).await.is_err() {
                debug!("Outcome receiver dropped");
            }
        }

        if let Err(e) = self.appender.close().await {
            warn!(error = %e, "Appender close failed");
        }

        let snapshot = self.metrics.snapshot();
        info!(
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            retries = snapshot.retries,
            "Dispatcher stopped"
        );

        match escalated {
            Some(e) => Err(e),
            None => Ok(snapshot),
        }
    }
}
