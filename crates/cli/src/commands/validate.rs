//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::ConfigLoader;
use contracts::{BridgeConfig, TransportKind, WindowAnchor};

use super::load_layers;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    transport: String,
    endpoint: String,
    topic: String,
    tag: u8,
    max_batch_size: usize,
    max_window_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    let result = validate_config(args);
    info!(config = %result.config_path, valid = result.valid, "Validated configuration");

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<defaults + environment>".to_string());

    let checked = load_layers(args.config.as_deref()).and_then(|mut config| {
        ConfigLoader::validate(&mut config)?;
        Ok(config)
    });

    match checked {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    transport: config.destination.transport.as_str().to_string(),
                    endpoint: config.destination.endpoint.clone(),
                    topic: config.destination.topic.clone(),
                    tag: config.subscription.tag,
                    max_batch_size: config.batch.max_batch_size,
                    max_window_ms: config.batch.max_window_ms,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &BridgeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.destination.transport == TransportKind::Log {
        warnings.push("transport is 'log' - batches are only written to the log output".into());
    }

    if config.retry.max_attempts == 1 {
        warnings.push("retry.max_attempts is 1 - failed batches are never retried".into());
    }

    if config.batch.window_anchor == WindowAnchor::Flush {
        warnings.push(
            "batch.window_anchor is 'flush' - windows restart after every count flush".into(),
        );
    }

    let worst_case_ms = config.retry.max_backoff_ms * u64::from(config.retry.max_attempts);
    if worst_case_ms > config.lifecycle.drain_timeout_ms {
        warnings.push(format!(
            "retry backoff can exceed lifecycle.drain_timeout_ms ({}ms > {}ms) - batches may be abandoned on shutdown",
            worst_case_ms, config.lifecycle.drain_timeout_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Transport: {}", summary.transport);
            println!("  Endpoint: {}", summary.endpoint);
            println!("  Topic: {}", summary.topic);
            println!("  Tag: {:#04x}", summary.tag);
            println!(
                "  Batch: {} records / {}ms",
                summary.max_batch_size, summary.max_window_ms
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(content: &str, suffix: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: Some(file.path().to_path_buf()),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_valid_file() {
        let (_file, args) = args_for(
            r#"
[destination]
transport = "tcp"
endpoint = "127.0.0.1:9092"
topic = "noise"
"#,
            ".toml",
        );
        let result = validate_config(&args);
        assert!(result.valid, "{:?}", result.error);
        let summary = result.summary.unwrap();
        assert_eq!(summary.transport, "tcp");
        assert_eq!(summary.topic, "noise");
    }

    #[test]
    fn test_invalid_file() {
        let (_file, args) = args_for("[batch]\nmax_batch_size = 0\n", ".toml");
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("max_batch_size"));
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: Some("/nonexistent/bridge.toml".into()),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_warnings() {
        let mut config = BridgeConfig::default();
        config.retry.max_attempts = 1;
        config.destination.transport = TransportKind::Log;
        let warnings = collect_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("never retried")));
        assert!(warnings.iter().any(|w| w.contains("'log'")));
    }
}
