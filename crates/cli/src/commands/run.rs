//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use config_loader::env::{parse_tag, parse_transport};
use config_loader::ConfigLoader;
use contracts::BridgeConfig;
use dispatcher::AnyAppender;
use ingestion::{MockNoiseConfig, MockNoiseSource, TcpPacketServer};
use orchestrator::Pipeline;

use super::load_layers;
use crate::cli::RunArgs;
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut config = load_layers(args.config.as_deref())?;
    apply_overrides(&mut config, args)?;
    ConfigLoader::validate(&mut config).map_err(CliError::from)?;

    info!(
        transport = config.destination.transport.as_str(),
        endpoint = %config.destination.endpoint,
        topic = %config.destination.topic,
        tag = format!("{:#04x}", config.subscription.tag),
        max_batch_size = config.batch.max_batch_size,
        max_window_ms = config.batch.max_window_ms,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let appender = AnyAppender::from_config(&config.destination)
        .map_err(|e| CliError::Appender(e.to_string()))?;

    let listen_addr = config.subscription.listen_addr.clone();
    let mut server = TcpPacketServer::bind(&listen_addr, config.subscription.channel_capacity)
        .await
        .map_err(|e| CliError::listen(&listen_addr, e))?;
    let sink = server.sink();
    let tcp_source = server
        .take_source()
        .context("packet server source already taken")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_shutdown(
        shutdown.clone(),
        (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
    ));

    let tag = config.subscription.tag;
    let pipeline = Pipeline::new(config);

    info!("Starting pipeline...");

    let result = if args.mock {
        let source = MockNoiseSource::new(MockNoiseConfig {
            tag,
            rate_hz: args.mock_rate,
            limit: (args.mock_limit > 0).then_some(args.mock_limit),
            ..Default::default()
        });
        // Peers only receive outcomes in mock mode
        drop(tcp_source);
        pipeline.run(source, sink, appender, shutdown).await
    } else {
        pipeline.run(tcp_source, sink, appender, shutdown).await
    };
    // Peers stay connected until every outcome has been published
    server.shutdown();

    match result {
        Ok(stats) => {
            info!(
                records = stats.ingestion.records_decoded,
                batches = stats.batcher.batches,
                succeeded = stats.dispatcher.succeeded,
                failed = stats.dispatcher.failed,
                duration_secs = stats.duration.as_secs_f64(),
                "Pipeline completed"
            );
            stats.print_summary();
        }
        Err(e) => {
            if let Some(stats) = e.stats() {
                stats.print_summary();
            }
            return Err(CliError::from(e)).context("Sensor bridge stopped");
        }
    }

    info!("Sensor bridge finished");
    Ok(())
}

/// Command-line flags win over file and environment
fn apply_overrides(config: &mut BridgeConfig, args: &RunArgs) -> Result<(), CliError> {
    if let Some(ref transport) = args.transport {
        config.destination.transport = parse_transport(transport)?;
    }
    if let Some(ref endpoint) = args.endpoint {
        info!(endpoint = %endpoint, "Overriding endpoint from CLI");
        config.destination.endpoint = endpoint.clone();
    }
    if let Some(ref topic) = args.topic {
        config.destination.topic = topic.clone();
    }
    if let Some(ref listen) = args.listen {
        config.subscription.listen_addr = listen.clone();
    }
    if let Some(ref tag) = args.tag {
        config.subscription.tag = parse_tag(tag)?;
    }
    Ok(())
}

/// Cancel on Ctrl+C, SIGTERM or the optional deadline
async fn watch_shutdown(token: CancellationToken, deadline: Option<Duration>) {
    let deadline = async {
        match deadline {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = shutdown_signal() => warn!("Received shutdown signal, draining pipeline..."),
        _ = deadline => info!("Run timeout reached, draining pipeline..."),
        _ = token.cancelled() => return,
    }
    token.cancel();
}

/// Resolves on Ctrl+C or SIGTERM; never resolves if a handler cannot be installed
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &BridgeConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Destination:");
    println!("  Transport: {}", config.destination.transport.as_str());
    println!("  Endpoint: {}", config.destination.endpoint);
    println!(
        "  Topic: {} (partition {})",
        config.destination.topic, config.destination.partition
    );
    println!("\nSubscription:");
    println!("  Tag: {:#04x}", config.subscription.tag);
    println!("  Listen: {}", config.subscription.listen_addr);
    println!("\nBatching:");
    println!("  Max batch size: {}", config.batch.max_batch_size);
    println!(
        "  Max window: {}ms ({:?})",
        config.batch.max_window_ms, config.batch.window_anchor
    );
    println!(
        "\nRetry: {} attempts, backoff {}ms..{}ms x{}",
        config.retry.max_attempts,
        config.retry.initial_backoff_ms,
        config.retry.max_backoff_ms,
        config.retry.multiplier
    );
    println!(
        "Breaker: opens after {} failures, cool-down {}ms",
        config.breaker.failure_threshold, config.breaker.cool_down_ms
    );
    println!();
}
