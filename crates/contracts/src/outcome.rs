//! DispatchOutcome - Dispatcher output
//!
//! Produced exactly once per batch, re-emitted by the orchestrator.

use serde::{Deserialize, Serialize};

use crate::Batch;

/// Result of dispatching one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Sequence number of the batch this outcome belongs to
    pub batch_sequence: u64,

    /// Whether the destination acknowledged the batch
    pub success: bool,

    /// Number of records in the batch
    pub item_count: usize,

    /// Service-reported status on success, error message on failure
    pub detail: String,

    /// Number of write attempts made (>= 1)
    pub attempts: u32,

    /// Wall time from first attempt to final result, backoff included
    #[serde(default)]
    pub latency_ms: u64,
}

impl DispatchOutcome {
    /// Successful outcome for `batch`
    pub fn succeeded(batch: &Batch, detail: impl Into<String>, attempts: u32) -> Self {
        Self {
            batch_sequence: batch.sequence,
            success: true,
            item_count: batch.len(),
            detail: detail.into(),
            attempts,
            latency_ms: 0,
        }
    }

    /// Permanently failed outcome for `batch`
    pub fn failed(batch: &Batch, detail: impl Into<String>, attempts: u32) -> Self {
        Self {
            batch_sequence: batch.sequence,
            success: false,
            item_count: batch.len(),
            detail: detail.into(),
            attempts,
            latency_ms: 0,
        }
    }

    /// Human-readable status line published alongside the JSON fields
    pub fn summary(&self) -> String {
        if self.success {
            format!("write {} items to log successfully", self.item_count)
        } else {
            format!("failed to write {} items to log", self.item_count)
        }
    }
}
