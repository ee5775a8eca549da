//! Error types for CLI operations.

use std::path::PathBuf;

use contracts::ContractError;
use orchestrator::PipelineError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Configuration could not be loaded or is invalid
    #[error("Invalid configuration: {0}")]
    Config(#[from] ContractError),

    /// Packet listener could not be started
    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: ContractError,
    },

    /// Appender could not be built from the destination config
    #[error("Failed to create appender: {0}")]
    Appender(String),

    /// Pipeline stopped with an error
    #[error("Pipeline execution failed: {0}")]
    Pipeline(#[from] PipelineError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn listen(addr: impl Into<String>, source: ContractError) -> Self {
        Self::Listen {
            addr: addr.into(),
            source,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
