//! Config validation
//!
//! Rules:
//! - batch size, window, pending queue and channel capacity non-zero
//! - retry attempts >= 1, multiplier >= 1.0, initial backoff <= max backoff
//! - topic non-empty, no `/`
//! - endpoint matches the transport (URL for http, `host:port` for tcp)
//! - tag fits the 6-bit tag space and is non-zero

use contracts::{BridgeConfig, ContractError, TransportKind};

/// Largest tag the packet header can carry
const MAX_TAG: u8 = 0x3F;

/// Validate a BridgeConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &BridgeConfig) -> Result<(), ContractError> {
    validate_destination(config)?;
    validate_batch(config)?;
    validate_retry(config)?;
    validate_subscription(config)?;
    Ok(())
}

fn validate_destination(config: &BridgeConfig) -> Result<(), ContractError> {
    let dest = &config.destination;

    if dest.topic.is_empty() {
        return Err(ContractError::config_validation(
            "destination.topic",
            "topic cannot be empty",
        ));
    }
    if dest.topic.contains('/') {
        return Err(ContractError::config_validation(
            "destination.topic",
            format!("topic '{}' must not contain '/'", dest.topic),
        ));
    }
    if dest.request_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "destination.request_timeout_ms",
            "request timeout must be > 0",
        ));
    }

    match dest.transport {
        TransportKind::Http => {
            if !(dest.endpoint.starts_with("http://") || dest.endpoint.starts_with("https://")) {
                return Err(ContractError::config_validation(
                    "destination.endpoint",
                    format!(
                        "http endpoint must start with http:// or https://, got '{}'",
                        dest.endpoint
                    ),
                ));
            }
        }
        TransportKind::Tcp => {
            let valid = dest
                .endpoint
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(ContractError::config_validation(
                    "destination.endpoint",
                    format!("tcp endpoint must be host:port, got '{}'", dest.endpoint),
                ));
            }
        }
        TransportKind::Log => {}
    }
    Ok(())
}

fn validate_batch(config: &BridgeConfig) -> Result<(), ContractError> {
    let batch = &config.batch;

    if batch.max_batch_size == 0 {
        return Err(ContractError::config_validation(
            "batch.max_batch_size",
            "max_batch_size must be >= 1",
        ));
    }
    if batch.max_window_ms == 0 {
        return Err(ContractError::config_validation(
            "batch.max_window_ms",
            "max_window_ms must be >= 1",
        ));
    }
    if batch.max_pending_batches == 0 {
        return Err(ContractError::config_validation(
            "batch.max_pending_batches",
            "max_pending_batches must be >= 1",
        ));
    }
    Ok(())
}

fn validate_retry(config: &BridgeConfig) -> Result<(), ContractError> {
    let retry = &config.retry;

    if retry.max_attempts == 0 {
        return Err(ContractError::config_validation(
            "retry.max_attempts",
            "max_attempts must be >= 1",
        ));
    }
    if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
        return Err(ContractError::config_validation(
            "retry.multiplier",
            format!("multiplier must be >= 1.0, got {}", retry.multiplier),
        ));
    }
    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(ContractError::config_validation(
            "retry.initial_backoff_ms / retry.max_backoff_ms",
            format!(
                "initial_backoff_ms ({}) must be <= max_backoff_ms ({})",
                retry.initial_backoff_ms, retry.max_backoff_ms
            ),
        ));
    }
    Ok(())
}

fn validate_subscription(config: &BridgeConfig) -> Result<(), ContractError> {
    let sub = &config.subscription;

    if sub.tag == 0 || sub.tag > MAX_TAG {
        return Err(ContractError::config_validation(
            "subscription.tag",
            format!("tag must be in 0x01..=0x3F, got {:#04x}", sub.tag),
        ));
    }
    if sub.channel_capacity == 0 {
        return Err(ContractError::config_validation(
            "subscription.channel_capacity",
            "channel_capacity must be >= 1",
        ));
    }
    Ok(())
}
