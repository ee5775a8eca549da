//! BridgeConfig - Config Loader output
//!
//! Immutable process configuration: destination, batching, retry, breaker and
//! subscription settings. Built once at startup and passed by reference.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default packet tag for sensor readings and outcome messages
pub const DEFAULT_TAG: u8 = 0x10;

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Destination log service
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Windowed batching
    #[serde(default)]
    pub batch: BatchConfig,

    /// Dispatch retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Dispatch circuit breaker
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Inbound subscription
    #[serde(default)]
    pub subscription: SubscriptionConfig,

    /// Pipeline lifecycle
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// Destination transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// REST batch-insert endpoint (`POST /topics/{topic}`)
    #[default]
    Http,
    /// Persistent TCP log-append connection
    Tcp,
    /// Log batches locally (dry runs)
    Log,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Tcp => "tcp",
            Self::Log => "log",
        }
    }
}

/// Encoding of each record's `value` in the HTTP body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// Base64 of the record's JSON bytes (`vnd.kafka.binary.v2+json`)
    #[default]
    Binary,
    /// Record as an inline JSON object (`vnd.kafka.json.v2+json`)
    Json,
}

/// Destination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Active transport
    #[serde(default)]
    pub transport: TransportKind,

    /// Base URL (http) or `host:port` (tcp)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Destination topic
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Fixed partition for every record
    #[serde(default)]
    pub partition: u32,

    /// HTTP value encoding
    #[serde(default)]
    pub record_format: RecordFormat,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Check reachability before starting the pipeline
    #[serde(default = "default_true")]
    pub probe_on_startup: bool,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            endpoint: default_endpoint(),
            topic: default_topic(),
            partition: 0,
            record_format: RecordFormat::default(),
            request_timeout_ms: default_request_timeout_ms(),
            probe_on_startup: true,
        }
    }
}

impl DestinationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_endpoint() -> String {
    "http://localhost:8082".to_string()
}

fn default_topic() -> String {
    "yomo-test".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

/// How the batcher schedules window deadlines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAnchor {
    /// Deadlines on a fixed cadence from pipeline start; count flushes do not
    /// move the next deadline
    #[default]
    Cadence,
    /// Every flush re-arms the deadline at `now + max_window`
    Flush,
}

/// Windowed batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Count threshold
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Time threshold in milliseconds
    #[serde(default = "default_max_window_ms")]
    pub max_window_ms: u64,

    /// Deadline scheduling
    #[serde(default)]
    pub window_anchor: WindowAnchor,

    /// Closed batches allowed to wait for the dispatcher before the batcher
    /// stops accepting records
    #[serde(default = "default_max_pending_batches")]
    pub max_pending_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_window_ms: default_max_window_ms(),
            window_anchor: WindowAnchor::default(),
            max_pending_batches: default_max_pending_batches(),
        }
    }
}

impl BatchConfig {
    pub fn max_window(&self) -> Duration {
        Duration::from_millis(self.max_window_ms)
    }
}

fn default_max_batch_size() -> usize {
    100
}

fn default_max_window_ms() -> u64 {
    3_000
}

fn default_max_pending_batches() -> usize {
    4
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per batch, first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Growth factor between delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Circuit breaker over consecutive failed batches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive permanently failed batches that open the breaker (0 = off)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Pause before the half-open probe
    #[serde(default = "default_cool_down_ms")]
    pub cool_down_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cool_down_ms: default_cool_down_ms(),
        }
    }
}

impl BreakerConfig {
    pub fn cool_down(&self) -> Duration {
        Duration::from_millis(self.cool_down_ms)
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cool_down_ms() -> u64 {
    10_000
}

/// Inbound subscription configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Tag of the packets to consume (also used for outcome packets)
    #[serde(default = "default_tag")]
    pub tag: u8,

    /// TCP listener address for producers
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Bounded capacity of the inbound packet channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            tag: default_tag(),
            listen_addr: default_listen_addr(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_tag() -> u8 {
    DEFAULT_TAG
}

fn default_listen_addr() -> String {
    "0.0.0.0:9140".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

/// Startup / shutdown behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Max wait for in-flight dispatches at shutdown
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Permanently failed batches in a row that abort the pipeline (0 = never)
    #[serde(default)]
    pub max_consecutive_failures: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: default_drain_timeout_ms(),
            max_consecutive_failures: 0,
        }
    }
}

impl LifecycleConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

fn default_drain_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_config_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.destination.transport, TransportKind::Http);
        assert_eq!(config.destination.endpoint, "http://localhost:8082");
        assert_eq!(config.destination.topic, "yomo-test");
        assert_eq!(config.destination.partition, 0);
        assert_eq!(config.batch.max_batch_size, 100);
        assert_eq!(config.batch.max_window(), Duration::from_secs(3));
        assert_eq!(config.batch.window_anchor, WindowAnchor::Cadence);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.subscription.tag, 0x10);
        assert_eq!(config.lifecycle.max_consecutive_failures, 0);
    }

    #[test]
    fn bridge_config_partial_json_uses_defaults() {
        let json = r#"{ "destination": { "topic": "noise" }, "batch": { "max_batch_size": 10 } }"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.destination.topic, "noise");
        assert_eq!(config.destination.endpoint, "http://localhost:8082");
        assert_eq!(config.batch.max_batch_size, 10);
        assert_eq!(config.batch.max_window_ms, 3_000);
        assert!(config.destination.probe_on_startup);
    }

    #[test]
    fn transport_kind_snake_case() {
        let kind: TransportKind = serde_json::from_str(r#""tcp""#).unwrap();
        assert_eq!(kind, TransportKind::Tcp);
        assert_eq!(kind.as_str(), "tcp");
    }
}
