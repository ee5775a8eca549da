//! # Batcher
//!
//! Windowed batching: records in, batches out. A window closes when it holds
//! `max_batch_size` records or when its timer fires, whichever comes first.
//!
//! ```ignore
//! use batcher::Batcher;
//!
//! let (batch_tx, batch_rx) = tokio::sync::mpsc::channel(1);
//! let handle = Batcher::new(config.batch.clone()).spawn(record_rx, batch_tx);
//! ```

mod metrics;
mod task;
mod window;

pub use metrics::{BatcherMetrics, BatcherSnapshot};
pub use task::Batcher;
pub use window::WindowedBatcher;
