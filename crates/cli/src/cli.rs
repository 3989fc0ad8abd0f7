//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Ops Hub - scheduler task event ingestion and alert fan-out
#[derive(Parser, Debug)]
#[command(
    name = "ops-hub",
    author,
    version,
    about = "Scheduler task event hub with admission control",
    long_about = "Receives scheduler task events over UDP, admits them through a bounded,\n\
                  rate-limited queue with backpressure detection, and fans them out to\n\
                  the configured sinks. Queue metrics are reported periodically."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "OPS_HUB_VERBOSE")]
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
        env = "OPS_HUB_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log level derived from `-v` / `-q`
    pub fn log_level(&self) -> &'static str {
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
    /// Run the UDP listener and event pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "ops-hub.toml", env = "OPS_HUB_CONFIG")]
    pub config: PathBuf,

    /// Override UDP listen host from configuration
    #[arg(long, env = "OPS_HUB_UDP_HOST")]
    pub host: Option<String>,

    /// Override UDP listen port from configuration
    #[arg(long, env = "OPS_HUB_UDP_PORT")]
    pub port: Option<u16>,

    /// Stop after this many seconds (0 = run until signalled)
    #[arg(long, default_value = "0", env = "OPS_HUB_TIMEOUT")]
    pub timeout: u64,

    /// Seconds to wait for in-flight events on shutdown
    #[arg(long, default_value = "30", env = "OPS_HUB_DRAIN_TIMEOUT")]
    pub drain_timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus port, overrides `metrics.prometheus_port` (0 = disabled)
    #[arg(long, env = "OPS_HUB_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "ops-hub.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "ops-hub.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink parameters
    #[arg(long)]
    pub sinks: bool,
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
