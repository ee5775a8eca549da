//! TcpAppender - persistent log-append connection
//!
//! One connection owned by the appender, opened lazily and dropped after any
//! transport failure so the next attempt reconnects.

use std::time::Duration;

use bytes::Bytes;
use contracts::{AppendAck, Batch, ContractError, DestinationConfig, LogAppender};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, instrument, warn};

use crate::protocol::{frame_codec, AppendRequest, AppendResponse};

type Connection = Framed<TcpStream, LengthDelimitedCodec>;

/// Appender speaking the length-prefixed log-append protocol
pub struct TcpAppender {
    name: String,
    endpoint: String,
    topic: String,
    partition: u32,
    request_timeout: Duration,
    conn: Option<Connection>,
}

impl TcpAppender {
    pub fn new(config: &DestinationConfig) -> Self {
        Self {
            name: "tcp".to_string(),
            endpoint: config.endpoint.clone(),
            topic: config.topic.clone(),
            partition: config.partition,
            request_timeout: config.request_timeout(),
            conn: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn transport_error(&self, message: impl Into<String>) -> ContractError {
        ContractError::transport(&self.name, &self.endpoint, message)
    }

    async fn ensure_connected(&mut self) -> Result<(), ContractError> {
        if self.conn.is_some() {
            return Ok(());
        }

        let stream = timeout(self.request_timeout, TcpStream::connect(&self.endpoint))
            .await
            .map_err(|_| self.transport_error("connect timed out"))?
            .map_err(|e| self.transport_error(format!("connect failed: {e}")))?;
        stream.set_nodelay(true)?;

        debug!(endpoint = %self.endpoint, "log connection established");
        self.conn = Some(Framed::new(stream, frame_codec()));
        Ok(())
    }

    fn encode(&self, batch: &Batch) -> Result<Bytes, ContractError> {
        let records = batch
            .records
            .iter()
            .map(|r| serde_json::to_vec(r).map(Bytes::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ContractError::serialization(&self.name, e.to_string()))?;

        AppendRequest {
            topic: self.topic.clone(),
            partition: self.partition,
            records,
        }
        .encode()
        .map_err(|e| ContractError::serialization(&self.name, e.to_string()))
    }
}

async fn exchange(conn: &mut Connection, payload: Bytes) -> Result<AppendResponse, String> {
    conn.send(payload).await.map_err(|e| format!("write failed: {e}"))?;
    match conn.next().await {
        Some(Ok(frame)) => {
            AppendResponse::decode(frame.freeze()).map_err(|e| format!("bad response: {e}"))
        }
        Some(Err(e)) => Err(format!("read failed: {e}")),
        None => Err("connection closed by peer".to_string()),
    }
}

impl LogAppender for TcpAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(name = "tcp_appender_probe", skip(self), fields(endpoint = %self.endpoint))]
    async fn probe(&mut self) -> Result<(), ContractError> {
        self.ensure_connected().await
    }

    #[instrument(
        name = "tcp_appender_append",
        skip(self, batch),
        fields(endpoint = %self.endpoint, seq = batch.sequence, size = batch.len())
    )]
    async fn append(&mut self, batch: &Batch) -> Result<AppendAck, ContractError> {
        let payload = self.encode(batch)?;
        self.ensure_connected().await?;

        let request_timeout = self.request_timeout;
        let result = match self.conn.as_mut() {
            Some(conn) => timeout(request_timeout, exchange(conn, payload))
                .await
                .unwrap_or_else(|_| Err("request timed out".to_string())),
            None => Err("not connected".to_string()),
        };

        match result {
            Ok(AppendResponse::Ack { base_offset }) => {
                debug!(base_offset, "batch acknowledged");
                Ok(AppendAck::new(format!("base_offset={base_offset}")))
            }
            Ok(AppendResponse::Nack { status, message }) => {
                Err(ContractError::rejected(&self.name, u16::from(status), message))
            }
            Err(message) => {
                // Stream state is unknown after a failed exchange
                self.conn = None;
                warn!(endpoint = %self.endpoint, error = %message, "dropping log connection");
                Err(self.transport_error(message))
            }
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut conn) = self.conn.take() {
            SinkExt::<Bytes>::close(&mut conn)
                .await
                .map_err(|e| self.transport_error(format!("close failed: {e}")))?;
        }
        Ok(())
    }
}
