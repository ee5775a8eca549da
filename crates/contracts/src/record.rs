//! SensorRecord - Decoder output, Batch - Batcher output

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A single decoded sensor reading
///
/// Immutable once decoded. The serde names match the JSON shape producers and
/// downstream consumers of the log topic already use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    /// Measured noise level
    pub noise: f32,

    /// Producer timestamp (unix milliseconds)
    #[serde(rename = "time")]
    pub timestamp_millis: i64,

    /// Identifier of the producing device
    #[serde(rename = "from")]
    pub source: String,
}

impl SensorRecord {
    pub fn new(noise: f32, timestamp_millis: i64, source: impl Into<String>) -> Self {
        Self {
            noise,
            timestamp_millis,
            source: source.into(),
        }
    }
}

/// Why a window was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    /// Buffer reached `max_batch_size`
    Count,
    /// Window deadline elapsed with a non-empty buffer
    Timer,
    /// Final partial window flushed at teardown
    Shutdown,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Timer => "timer",
            Self::Shutdown => "shutdown",
        }
    }
}

/// A closed, ordered group of records handed to the dispatcher as one unit
///
/// Invariant: `1 <= records.len() <= max_batch_size`. Construction goes through
/// the batcher; a batch is never mutated after it leaves the batcher.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Monotonically increasing sequence number (starts at 1)
    pub sequence: u64,

    /// Instant the window that produced this batch opened
    pub opened_at: Instant,

    /// Close trigger
    pub reason: FlushReason,

    /// Records in arrival order
    pub records: Vec<SensorRecord>,
}

impl Batch {
    /// Number of records in the batch
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false for batches produced by the batcher
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
