//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::HubBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    udp_bind_addr: String,
    queue: QueueInfo,
    metrics: MetricsInfo,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct QueueInfo {
    max_concurrent: usize,
    max_size: usize,
    backpressure_threshold: f64,
    backpressure_recovery: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit_per_minute: Option<u32>,
    max_message_size: usize,
}

#[derive(Serialize)]
struct MetricsInfo {
    enable: bool,
    write_frequency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus_port: Option<u16>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    alerts_only: bool,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &HubBlueprint, args: &InfoArgs) -> ConfigInfo {
    let queue = &blueprint.task_events;
    let threshold = queue.message_queue.backpressure_threshold;

    let sinks = blueprint
        .sinks
        .iter()
        .map(|s| SinkInfo {
            name: s.name.clone(),
            sink_type: format!("{:?}", s.sink_type),
            queue_capacity: s.queue_capacity,
            alerts_only: s.alerts_only,
            params: if args.sinks {
                s.params.clone()
            } else {
                HashMap::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        udp_bind_addr: blueprint.udp_bind_addr(),
        queue: QueueInfo {
            max_concurrent: queue.message_queue.max_concurrent,
            max_size: queue.message_queue.max_size,
            backpressure_threshold: threshold,
            backpressure_recovery: threshold * ingestion::BACKPRESSURE_RECOVERY_FACTOR,
            rate_limit_per_minute: queue
                .rate_limit
                .enable
                .then_some(queue.rate_limit.max_messages_per_minute)
                .flatten(),
            max_message_size: queue.max_message_size,
        },
        metrics: MetricsInfo {
            enable: blueprint.metrics.enable,
            write_frequency_ms: blueprint.metrics.write_frequency_ms,
            prometheus_port: blueprint.metrics.prometheus_port,
        },
        sinks,
    }
}

fn print_config_info(blueprint: &HubBlueprint, args: &InfoArgs) {
    let queue = &blueprint.task_events;
    let threshold = queue.message_queue.backpressure_threshold;

    println!("Ops Hub Configuration ({:?})", blueprint.version);
    println!("=============================\n");

    println!("UDP listener");
    println!("   └─ {}", blueprint.udp_bind_addr());

    println!("\nTask event queue");
    println!("   ├─ Max concurrent: {}", queue.message_queue.max_concurrent);
    println!("   ├─ Max waiting: {}", queue.message_queue.max_size);
    println!(
        "   ├─ Backpressure: on at {:.1}%, off below {:.1}%",
        threshold,
        threshold * ingestion::BACKPRESSURE_RECOVERY_FACTOR
    );
    match (
        queue.rate_limit.enable,
        queue.rate_limit.max_messages_per_minute,
    ) {
        (true, Some(limit)) => println!("   ├─ Rate limit: {} / min", limit),
        _ => println!("   ├─ Rate limit: disabled"),
    }
    println!("   └─ Max message size: {} bytes", queue.max_message_size);

    println!("\nMetrics");
    if blueprint.metrics.enable {
        println!(
            "   ├─ Report every: {} ms",
            blueprint.metrics.write_frequency_ms
        );
    } else {
        println!("   ├─ Reporting: disabled");
    }
    match blueprint.metrics.prometheus_port {
        Some(port) => println!("   └─ Prometheus: 0.0.0.0:{}", port),
        None => println!("   └─ Prometheus: disabled"),
    }

    println!("\nSinks ({})", blueprint.sinks.len());
    for (i, sink) in blueprint.sinks.iter().enumerate() {
        let is_last = i == blueprint.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({:?}{})",
            prefix,
            sink.name,
            sink.sink_type,
            if sink.alerts_only { ", alerts only" } else { "" }
        );

        if args.sinks {
            let mut params: Vec<_> = sink.params.iter().collect();
            params.sort();
            for (key, value) in params {
                println!("   {}  {} = {}", child_prefix, key, value);
            }
        }
    }

    println!();
}
