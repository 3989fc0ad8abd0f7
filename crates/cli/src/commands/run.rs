//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::HubBlueprint;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding UDP host from CLI");
        blueprint.udp.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding UDP port from CLI");
        blueprint.udp.port = port;
    }

    info!(
        udp = %blueprint.udp_bind_addr(),
        max_concurrent = blueprint.task_events.message_queue.max_concurrent,
        max_size = blueprint.task_events.message_queue.max_size,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let metrics_port = match args.metrics_port {
        Some(0) => None,
        Some(port) => Some(port),
        None => blueprint.metrics.prometheus_port,
    };

    let pipeline_config = PipelineConfig {
        blueprint,
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        drain_timeout: Duration::from_secs(args.drain_timeout),
        metrics_port,
    };

    let pipeline = Pipeline::new(pipeline_config);

    info!("Starting pipeline...");

    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        datagrams = stats.datagrams_received,
        admitted = stats.admitted,
        dropped = stats.dropped(),
        parse_errors = stats.parse_errors,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("Ops Hub finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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

    warn!("Received shutdown signal, stopping pipeline...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &HubBlueprint) {
    let queue = &blueprint.task_events;

    println!("\n=== Configuration Summary ===\n");
    println!("UDP listener: {}", blueprint.udp_bind_addr());

    println!("\nTask event queue:");
    println!("  Max concurrent: {}", queue.message_queue.max_concurrent);
    println!("  Max waiting: {}", queue.message_queue.max_size);
    println!(
        "  Backpressure threshold: {:.1}%",
        queue.message_queue.backpressure_threshold
    );
    match (
        queue.rate_limit.enable,
        queue.rate_limit.max_messages_per_minute,
    ) {
        (true, Some(limit)) => println!("  Rate limit: {} / min", limit),
        _ => println!("  Rate limit: disabled"),
    }
    println!("  Max message size: {} bytes", queue.max_message_size);

    if blueprint.metrics.enable {
        println!(
            "\nMetrics: every {} ms",
            blueprint.metrics.write_frequency_ms
        );
    } else {
        println!("\nMetrics: disabled");
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!(
                "  - {} ({:?}{})",
                sink.name,
                sink.sink_type,
                if sink.alerts_only { ", alerts only" } else { "" }
            );
        }
    }

    println!();
}
