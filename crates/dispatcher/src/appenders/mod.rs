//! Log appender implementations

mod http;
mod log;
mod tcp;

pub use http::{content_type, encode_body, HttpAppender};
pub use log::TracingAppender;
pub use tcp::TcpAppender;

use contracts::{
    AppendAck, Batch, ContractError, DestinationConfig, LogAppender, TransportKind,
};

use crate::error::DispatcherError;

/// Appender selected by `destination.transport`
pub enum AnyAppender {
    Http(HttpAppender),
    Tcp(TcpAppender),
    Log(TracingAppender),
}

impl AnyAppender {
    pub fn from_config(config: &DestinationConfig) -> Result<Self, DispatcherError> {
        match config.transport {
            TransportKind::Http => HttpAppender::new(config)
                .map(Self::Http)
                .map_err(|e| DispatcherError::appender_creation("http", e.to_string())),
            TransportKind::Tcp => Ok(Self::Tcp(TcpAppender::new(config))),
            TransportKind::Log => Ok(Self::Log(TracingAppender::new(config))),
        }
    }
}

impl LogAppender for AnyAppender {
    fn name(&self) -> &str {
        match self {
            Self::Http(a) => a.name(),
            Self::Tcp(a) => a.name(),
            Self::Log(a) => a.name(),
        }
    }

    fn endpoint(&self) -> &str {
        match self {
            Self::Http(a) => a.endpoint(),
            Self::Tcp(a) => a.endpoint(),
            Self::Log(a) => a.endpoint(),
        }
    }

    async fn probe(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Http(a) => a.probe().await,
            Self::Tcp(a) => a.probe().await,
            Self::Log(a) => a.probe().await,
        }
    }

    async fn append(&mut self, batch: &Batch) -> Result<AppendAck, ContractError> {
        match self {
            Self::Http(a) => a.append(batch).await,
            Self::Tcp(a) => a.append(batch).await,
            Self::Log(a) => a.append(batch).await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Http(a) => a.close().await,
            Self::Tcp(a) => a.close().await,
            Self::Log(a) => a.close().await,
        }
    }
}
