//! DispatcherHandle - dispatcher worker running on its own task

use std::sync::Arc;

use contracts::{Batch, DispatchOutcome, LogAppender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use crate::dispatcher::Dispatcher;
use crate::error::DispatcherError;
use crate::metrics::{DispatcherMetrics, DispatcherSnapshot};

/// Handle to a running dispatch worker
pub struct DispatcherHandle {
    /// Appender name
    name: String,
    /// Shared metrics
    metrics: Arc<DispatcherMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<Result<DispatcherSnapshot, DispatcherError>>,
}

impl DispatcherHandle {
    /// Spawn `dispatcher` consuming `rx` and publishing to `outcomes`
    pub fn spawn<A: LogAppender + 'static>(
        dispatcher: Dispatcher<A>,
        rx: mpsc::Receiver<Batch>,
        outcomes: mpsc::Sender<DispatchOutcome>,
    ) -> Self {
        let name = dispatcher.appender().name().to_string();
        let metrics = dispatcher.metrics();
        let worker_handle = tokio::spawn(dispatcher.run(rx, outcomes));

        Self {
            name,
            metrics,
            worker_handle,
        }
    }

    /// Get appender name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<DispatcherMetrics> {
        &self.metrics
    }

    pub fn is_finished(&self) -> bool {
        self.worker_handle.is_finished()
    }

    /// Wait for the worker to drain its queue and stop
    ///
    /// Cancel-safe: may be raced against a drain deadline and followed by
    /// [`abort`](Self::abort).
    #[instrument(name = "dispatcher_handle_join", skip(self), fields(appender = %self.name))]
    pub async fn join(&mut self) -> Result<DispatcherSnapshot, DispatcherError> {
        let result = (&mut self.worker_handle).await.map_err(|e| {
            error!(appender = %self.name, error = ?e, "Worker task panicked");
            DispatcherError::Worker(e.to_string())
        })?;
        debug!(appender = %self.name, "Dispatcher worker finished");
        result
    }

    /// Stop the worker without draining
    pub fn abort(&self) {
        self.worker_handle.abort();
    }
}
