//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Appender creation error
    #[error("failed to create appender '{name}': {message}")]
    AppenderCreation { name: String, message: String },

    /// Too many batches in a row failed permanently
    #[error("{count} consecutive batches failed, last error: {last_error}")]
    ConsecutiveFailures { count: u32, last_error: String },

    /// Worker task panicked or was aborted
    #[error("dispatcher worker stopped abnormally: {0}")]
    Worker(String),

    /// Appender error (from contract)
    #[error("appender error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    pub fn appender_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AppenderCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
