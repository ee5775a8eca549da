//! Pipeline error types

use codec::CodecError;
use contracts::ContractError;
use dispatcher::DispatcherError;
use thiserror::Error;

use crate::stats::PipelineStats;

/// Fatal pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Startup check failed; nothing was consumed
    #[error("startup failed: {0}")]
    Startup(#[source] ContractError),

    /// Consecutive-failure escalation; the pipeline drained before returning
    #[error("pipeline aborted: {source}")]
    Aborted {
        stats: Box<PipelineStats>,
        #[source]
        source: DispatcherError,
    },

    /// A stage task panicked
    #[error("{stage} task failed: {message}")]
    Task { stage: &'static str, message: String },
}

impl PipelineError {
    pub fn task(stage: &'static str, message: impl ToString) -> Self {
        Self::Task {
            stage,
            message: message.to_string(),
        }
    }

    /// Stats gathered before the failure, when the pipeline ran at all
    pub fn stats(&self) -> Option<&PipelineStats> {
        match self {
            Self::Aborted { stats, .. } => Some(stats),
            _ => None,
        }
    }
}

/// Outcome message could not be encoded or decoded
#[derive(Debug, Error)]
pub enum OutcomeError {
    #[error("outcome json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("outcome packet error: {0}")]
    Codec(#[from] CodecError),
}
