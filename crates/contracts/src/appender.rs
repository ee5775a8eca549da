//! LogAppender trait - Dispatcher output interface
//!
//! Defines the abstract interface for destination log services.

use crate::{Batch, ContractError};

/// Acknowledgement returned by a destination for an appended batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendAck {
    /// Service-reported status (response body, offset, ...)
    pub detail: String,
}

impl AppendAck {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Append-only log destination
///
/// All transport implementations (HTTP proxy, TCP log protocol, ...) implement
/// this trait. The dispatcher owns the appender exclusively.
#[trait_variant::make(LogAppender: Send)]
pub trait LocalLogAppender {
    /// Appender name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Destination endpoint, for diagnostics
    fn endpoint(&self) -> &str;

    /// Check that the destination is reachable
    ///
    /// Called once at startup; a failure aborts startup.
    async fn probe(&mut self) -> Result<(), ContractError>;

    /// Append all records of `batch` to the configured topic
    ///
    /// # Errors
    /// `Serialization`, `Transport` or `Rejected`; the caller decides on retry.
    async fn append(&mut self, batch: &Batch) -> Result<AppendAck, ContractError>;

    /// Release the connection
    async fn close(&mut self) -> Result<(), ContractError>;
}
