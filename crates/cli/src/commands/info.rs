//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use config_loader::ConfigLoader;
use contracts::BridgeConfig;
use dispatcher::RetryPolicy;

use super::load_layers;
use crate::cli::InfoArgs;

/// Effective configuration plus derived values, for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    source: String,
    #[serde(flatten)]
    config: &'a BridgeConfig,
    derived: DerivedInfo,
}

#[derive(Serialize)]
struct DerivedInfo {
    /// Total backoff of one exhausted retry sequence
    worst_case_backoff_ms: u64,
    /// Readings per second at which the count trigger fires before the timer
    count_flush_threshold_hz: f64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let mut config = load_layers(args.config.as_deref())?;
    ConfigLoader::validate(&mut config).context("Configuration is invalid")?;

    let source = args
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<defaults + environment>".to_string());
    info!(source = %source, "Loaded configuration info");

    if args.toml {
        println!("{}", ConfigLoader::to_toml(&config)?);
    } else if args.json {
        let info = ConfigInfo {
            source,
            derived: derive_info(&config),
            config: &config,
        };
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, &source);
    }

    Ok(())
}

fn derive_info(config: &BridgeConfig) -> DerivedInfo {
    let policy = RetryPolicy::new(&config.retry);
    let total: Duration = (1..policy.max_attempts())
        .map(|attempt| policy.backoff(attempt))
        .sum();

    DerivedInfo {
        worst_case_backoff_ms: total.as_millis() as u64,
        count_flush_threshold_hz: config.batch.max_batch_size as f64 * 1000.0
            / config.batch.max_window_ms as f64,
    }
}

fn print_config_info(config: &BridgeConfig, source: &str) {
    let derived = derive_info(config);

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Bridge Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Source: {}", source);

    println!("\nDestination");
    println!("   ├─ Transport: {}", config.destination.transport.as_str());
    println!("   ├─ Endpoint: {}", config.destination.endpoint);
    println!(
        "   ├─ Topic: {} (partition {})",
        config.destination.topic, config.destination.partition
    );
    println!("   ├─ Record format: {:?}", config.destination.record_format);
    println!(
        "   ├─ Request timeout: {}ms",
        config.destination.request_timeout_ms
    );
    println!(
        "   └─ Probe on startup: {}",
        config.destination.probe_on_startup
    );

    println!("\nSubscription");
    println!("   ├─ Tag: {:#04x}", config.subscription.tag);
    println!("   ├─ Listen: {}", config.subscription.listen_addr);
    println!(
        "   └─ Channel capacity: {}",
        config.subscription.channel_capacity
    );

    println!("\nBatching");
    println!("   ├─ Max batch size: {}", config.batch.max_batch_size);
    println!("   ├─ Max window: {}ms", config.batch.max_window_ms);
    println!("   ├─ Window anchor: {:?}", config.batch.window_anchor);
    println!(
        "   └─ Count trigger above: {:.1} readings/s",
        derived.count_flush_threshold_hz
    );

    println!("\nResilience");
    println!(
        "   ├─ Retry: {} attempts, {}ms..{}ms x{}",
        config.retry.max_attempts,
        config.retry.initial_backoff_ms,
        config.retry.max_backoff_ms,
        config.retry.multiplier
    );
    println!(
        "   ├─ Worst-case backoff: {}ms",
        derived.worst_case_backoff_ms
    );
    println!(
        "   ├─ Breaker: {} failures, cool-down {}ms",
        config.breaker.failure_threshold, config.breaker.cool_down_ms
    );
    println!(
        "   └─ Drain timeout: {}ms, abort after {} consecutive failures",
        config.lifecycle.drain_timeout_ms, config.lifecycle.max_consecutive_failures
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_values() {
        let mut config = BridgeConfig::default();
        config.retry.max_attempts = 4;
        config.retry.initial_backoff_ms = 100;
        config.retry.max_backoff_ms = 300;
        config.retry.multiplier = 2.0;
        config.batch.max_batch_size = 100;
        config.batch.max_window_ms = 500;

        let derived = derive_info(&config);
        // 100 + 200 + min(400, 300)
        assert_eq!(derived.worst_case_backoff_ms, 600);
        assert_eq!(derived.count_flush_threshold_hz, 200.0);
    }

    #[test]
    fn test_json_flattens_config() {
        let config = BridgeConfig::default();
        let info = ConfigInfo {
            source: "test".into(),
            derived: derive_info(&config),
            config: &config,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["source"], "test");
        assert!(json["destination"]["topic"].is_string());
        assert!(json["derived"]["worst_case_backoff_ms"].is_u64());
    }
}
