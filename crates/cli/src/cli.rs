//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sensor Bridge - batches tagged sensor packets into a log service
#[derive(Parser, Debug)]
#[command(
    name = "sensor-bridge",
    author,
    version,
    about = "Sensor packet to log service bridge",
    long_about = "Subscribes to tagged sensor packets, batches decoded readings by count \n\
                  or time window and appends each batch to a log service over HTTP or \n\
                  TCP. One outcome packet per batch is sent back on the same tag."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this port
    #[arg(long, global = true, env = "BRIDGE_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Filter used when `RUST_LOG` is unset
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge
    Run(RunArgs),

    /// Validate configuration without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults and environment only when omitted
    #[arg(short, long, env = "BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override transport (http, tcp, log)
    #[arg(long)]
    pub transport: Option<String>,

    /// Override destination endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Override destination topic
    #[arg(long)]
    pub topic: Option<String>,

    /// Override packet listen address
    #[arg(long)]
    pub listen: Option<String>,

    /// Override subscribed tag (decimal or 0x-prefixed hex)
    #[arg(long)]
    pub tag: Option<String>,

    /// Feed the pipeline from a synthetic noise source instead of producers
    #[arg(long)]
    pub mock: bool,

    /// Mock readings per second
    #[arg(long, default_value = "10", requires = "mock")]
    pub mock_rate: f64,

    /// Stop the mock source after this many readings (0 = endless)
    #[arg(long, default_value = "0", requires = "mock")]
    pub mock_limit: u64,

    /// Stop after this many seconds (0 = run until signalled)
    #[arg(long, default_value = "0", env = "BRIDGE_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, env = "BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, env = "BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the effective configuration as TOML
    #[arg(long, conflicts_with = "json")]
    pub toml: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
