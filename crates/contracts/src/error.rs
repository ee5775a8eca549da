//! Layered error definitions
//!
//! Categorized by source: config / serialization / transport / subscription

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Destination could not be reached during startup
    #[error("destination '{endpoint}' unreachable: {message}")]
    DestinationUnreachable { endpoint: String, message: String },

    // ===== Dispatch Errors =====
    /// Batch could not be encoded for the destination
    #[error("serialization error for '{appender}': {message}")]
    Serialization { appender: String, message: String },

    /// Destination unreachable or connection broken mid-request
    #[error("transport error for '{appender}' at {endpoint}: {message}")]
    Transport {
        appender: String,
        endpoint: String,
        message: String,
    },

    /// Destination answered but refused the batch
    #[error("'{appender}' rejected batch with status {status}: {message}")]
    Rejected {
        appender: String,
        status: u16,
        message: String,
    },

    // ===== Subscription Errors =====
    /// Output sink write error
    #[error("packet sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Subscription source error
    #[error("packet source '{source_name}' error: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create serialization error
    pub fn serialization(appender: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            appender: appender.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(
        appender: impl Into<String>,
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            appender: appender.into(),
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create rejection error
    pub fn rejected(appender: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            appender: appender.into(),
            status,
            message: message.into(),
        }
    }

    /// Create packet sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create packet source error
    pub fn source_error(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Short error kind label, used for metrics and outcome details
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } => "configuration",
            Self::DestinationUnreachable { .. } => "configuration",
            Self::Serialization { .. } => "serialization",
            Self::Transport { .. } => "transport",
            Self::Rejected { .. } => "rejected",
            Self::SinkWrite { .. } | Self::Source { .. } => "subscription",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = ContractError::transport("http", "http://localhost:8082", "connection refused");
        let text = err.to_string();
        assert!(text.contains("http://localhost:8082"));
        assert!(text.contains("connection refused"));
        assert_eq!(err.kind(), "transport");
    }

    #[test]
    fn test_rejected_kind() {
        let err = ContractError::rejected("http", 503, "unavailable");
        assert_eq!(err.kind(), "rejected");
        assert!(err.to_string().contains("503"));
    }
}
