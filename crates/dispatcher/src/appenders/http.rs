//! HttpAppender - REST proxy batch insert
//!
//! `POST {endpoint}/topics/{topic}` with a Kafka REST v2 produce body:
//!
//! ```json
//! {"records":[{"value":"eyJub2lzZSI6...","partition":0}]}
//! ```

use base64::prelude::*;
use contracts::{AppendAck, Batch, ContractError, DestinationConfig, LogAppender, RecordFormat};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

const BINARY_CONTENT_TYPE: &str = "application/vnd.kafka.binary.v2+json";
const JSON_CONTENT_TYPE: &str = "application/vnd.kafka.json.v2+json";
const ACCEPT_V2: &str = "application/vnd.kafka.v2+json, application/json";

#[derive(Serialize)]
struct ProduceRecord<V> {
    value: V,
    partition: u32,
}

#[derive(Serialize)]
struct ProduceRequest<V> {
    records: Vec<ProduceRecord<V>>,
}

#[derive(Debug, Deserialize)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<OffsetEntry>,
}

#[derive(Debug, Deserialize)]
struct OffsetEntry {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

/// Content type for `format`
pub fn content_type(format: RecordFormat) -> &'static str {
    match format {
        RecordFormat::Binary => BINARY_CONTENT_TYPE,
        RecordFormat::Json => JSON_CONTENT_TYPE,
    }
}

/// Serialize `batch` into a produce request body
pub fn encode_body(
    batch: &Batch,
    format: RecordFormat,
    partition: u32,
) -> Result<Vec<u8>, serde_json::Error> {
    match format {
        RecordFormat::Binary => {
            let records = batch
                .records
                .iter()
                .map(|record| {
                    Ok(ProduceRecord {
                        value: BASE64_STANDARD.encode(serde_json::to_vec(record)?),
                        partition,
                    })
                })
                .collect::<Result<Vec<_>, serde_json::Error>>()?;
            serde_json::to_vec(&ProduceRequest { records })
        }
        RecordFormat::Json => {
            let records = batch
                .records
                .iter()
                .map(|record| ProduceRecord {
                    value: record,
                    partition,
                })
                .collect();
            serde_json::to_vec(&ProduceRequest { records })
        }
    }
}

/// Appender speaking the REST proxy produce API
pub struct HttpAppender {
    name: String,
    endpoint: String,
    topic: String,
    url: String,
    partition: u32,
    format: RecordFormat,
    client: Client,
}

impl HttpAppender {
    pub fn new(config: &DestinationConfig) -> Result<Self, ContractError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ContractError::transport("http", &config.endpoint, e.to_string()))?;

        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let url = format!("{}/topics/{}", endpoint, config.topic);

        Ok(Self {
            name: "http".to_string(),
            endpoint,
            topic: config.topic.clone(),
            url,
            partition: config.partition,
            format: config.record_format,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, e: reqwest::Error) -> ContractError {
        let message = if e.is_timeout() {
            format!("request timed out: {e}")
        } else if e.is_connect() {
            format!("connection failed: {e}")
        } else {
            e.to_string()
        };
        ContractError::transport(&self.name, &self.url, message)
    }
}

impl LogAppender for HttpAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(name = "http_appender_probe", skip(self), fields(endpoint = %self.endpoint))]
    async fn probe(&mut self) -> Result<(), ContractError> {
        let url = format!("{}/topics", self.endpoint);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, ACCEPT_V2)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContractError::rejected(
                &self.name,
                status.as_u16(),
                format!("GET {url} failed"),
            ));
        }

        match response.json::<Vec<String>>().await {
            Ok(topics) if !topics.iter().any(|t| t == &self.topic) => {
                warn!(topic = %self.topic, "topic not listed by proxy, relying on auto-create");
            }
            Ok(_) => debug!(topic = %self.topic, "topic present"),
            Err(e) => debug!(error = %e, "topic listing not parseable, skipping check"),
        }
        Ok(())
    }

    #[instrument(
        name = "http_appender_append",
        skip(self, batch),
        fields(url = %self.url, seq = batch.sequence, size = batch.len())
    )]
    async fn append(&mut self, batch: &Batch) -> Result<AppendAck, ContractError> {
        let body = encode_body(batch, self.format, self.partition)
            .map_err(|e| ContractError::serialization(&self.name, e.to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, content_type(self.format))
            .header(ACCEPT, ACCEPT_V2)
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ContractError::rejected(&self.name, status.as_u16(), text));
        }

        // The proxy answers 200 even when individual records failed
        if let Ok(parsed) = serde_json::from_str::<ProduceResponse>(&text) {
            if let Some(entry) = parsed.offsets.iter().find(|o| o.error_code.is_some()) {
                return Err(ContractError::rejected(
                    &self.name,
                    status.as_u16(),
                    format!(
                        "record error {}: {}",
                        entry.error_code.unwrap_or_default(),
                        entry.error.as_deref().unwrap_or("unknown")
                    ),
                ));
            }
        }

        debug!(status = status.as_u16(), "batch accepted");
        Ok(AppendAck::new(text))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
