//! Environment overrides
//!
//! Read once at startup. The lookup is injectable so tests never touch the
//! process environment.

use std::str::FromStr;

use contracts::{BridgeConfig, ContractError, RecordFormat, TransportKind};
use tracing::debug;

pub const TRANSPORT: &str = "BRIDGE_TRANSPORT";
/// HTTP endpoint (REST proxy base URL)
pub const PROXY_URL: &str = "PANDAPROXY_URL";
/// TCP endpoint (`host:port`)
pub const LOG_ADDR: &str = "BRIDGE_LOG_ADDR";
pub const TOPIC: &str = "REDPANDA_TOPIC";
pub const RECORD_FORMAT: &str = "BRIDGE_RECORD_FORMAT";
pub const BATCH_SIZE: &str = "BRIDGE_BATCH_SIZE";
pub const WINDOW_MS: &str = "BRIDGE_WINDOW_MS";
pub const RETRY_ATTEMPTS: &str = "BRIDGE_RETRY_ATTEMPTS";
pub const TAG: &str = "BRIDGE_TAG";
pub const LISTEN_ADDR: &str = "BRIDGE_LISTEN_ADDR";

/// Apply every variable `lookup` knows about to `config`
pub fn apply_env<F>(config: &mut BridgeConfig, lookup: F) -> Result<(), ContractError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .inspect(|v| debug!(key, value = %v, "env override"))
    };

    if let Some(v) = get(TRANSPORT) {
        config.destination.transport = parse_transport(&v)?;
    }

    // Endpoint variable depends on the (possibly overridden) transport
    let endpoint_key = match config.destination.transport {
        TransportKind::Http => Some(PROXY_URL),
        TransportKind::Tcp => Some(LOG_ADDR),
        TransportKind::Log => None,
    };
    if let Some(v) = endpoint_key.and_then(get) {
        config.destination.endpoint = v;
    }

    if let Some(v) = get(TOPIC) {
        config.destination.topic = v;
    }
    if let Some(v) = get(RECORD_FORMAT) {
        config.destination.record_format = parse_record_format(&v)?;
    }
    if let Some(v) = get(BATCH_SIZE) {
        config.batch.max_batch_size = parse_number(BATCH_SIZE, &v)?;
    }
    if let Some(v) = get(WINDOW_MS) {
        config.batch.max_window_ms = parse_number(WINDOW_MS, &v)?;
    }
    if let Some(v) = get(RETRY_ATTEMPTS) {
        config.retry.max_attempts = parse_number(RETRY_ATTEMPTS, &v)?;
    }
    if let Some(v) = get(TAG) {
        config.subscription.tag = parse_tag(&v)?;
    }
    if let Some(v) = get(LISTEN_ADDR) {
        config.subscription.listen_addr = v;
    }
    Ok(())
}

pub fn parse_transport(value: &str) -> Result<TransportKind, ContractError> {
    match value.to_ascii_lowercase().as_str() {
        "http" => Ok(TransportKind::Http),
        "tcp" => Ok(TransportKind::Tcp),
        "log" => Ok(TransportKind::Log),
        other => Err(ContractError::config_validation(
            TRANSPORT,
            format!("unknown transport '{other}', expected http, tcp or log"),
        )),
    }
}

fn parse_record_format(value: &str) -> Result<RecordFormat, ContractError> {
    match value.to_ascii_lowercase().as_str() {
        "binary" => Ok(RecordFormat::Binary),
        "json" => Ok(RecordFormat::Json),
        other => Err(ContractError::config_validation(
            RECORD_FORMAT,
            format!("unknown record format '{other}', expected binary or json"),
        )),
    }
}

/// Decimal or `0x`-prefixed hex tag
pub fn parse_tag(value: &str) -> Result<u8, ContractError> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|e| ContractError::config_validation(TAG, format!("invalid tag '{value}': {e}")))
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ContractError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ContractError::config_validation(key, format!("invalid number '{value}': {e}")))
}
