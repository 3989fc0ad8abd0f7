//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{HubBlueprint, SinkType};
use serde::Serialize;
use tracing::info;

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
    version: String,
    udp_bind_addr: String,
    max_concurrent: usize,
    max_size: usize,
    rate_limit: Option<u32>,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

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
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let queue = &blueprint.task_events;

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    udp_bind_addr: blueprint.udp_bind_addr(),
                    max_concurrent: queue.message_queue.max_concurrent,
                    max_size: queue.message_queue.max_size,
                    rate_limit: queue
                        .rate_limit
                        .enable
                        .then_some(queue.rate_limit.max_messages_per_minute)
                        .flatten(),
                    sink_count: blueprint.sinks.len(),
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
fn collect_warnings(blueprint: &HubBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let queue = &blueprint.task_events;

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - admitted events are only counted".to_string());
    }

    if queue.message_queue.max_size == 0 {
        warnings.push(
            "task_events.message_queue.max_size is 0 - events are dropped whenever all workers are busy"
                .to_string(),
        );
    }

    if queue.message_queue.backpressure_threshold == 0.0 {
        warnings.push(
            "task_events.message_queue.backpressure_threshold is 0 - backpressure is always active"
                .to_string(),
        );
    }

    if !queue.rate_limit.enable && queue.rate_limit.max_messages_per_minute.is_some() {
        warnings.push(
            "task_events.rate_limit.max_messages_per_minute is set but rate limiting is disabled"
                .to_string(),
        );
    }

    if !blueprint.metrics.enable {
        warnings.push("metrics.enable is false - queue metrics are never reported".to_string());
    }

    let has_alert_sink = blueprint
        .sinks
        .iter()
        .any(|s| s.sink_type != SinkType::Log);
    if !blueprint.sinks.is_empty() && !has_alert_sink {
        warnings.push("Only log sinks configured - alerts are not forwarded anywhere".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  UDP listener: {}", summary.udp_bind_addr);
            println!(
                "  Queue: {} concurrent, {} waiting",
                summary.max_concurrent, summary.max_size
            );
            match summary.rate_limit {
                Some(limit) => println!("  Rate limit: {} / min", limit),
                None => println!("  Rate limit: disabled"),
            }
            println!("  Sinks: {}", summary.sink_count);
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
    use contracts::SinkConfig;
    use std::collections::HashMap;

    #[test]
    fn test_warnings_for_defaults() {
        let warnings = collect_warnings(&HubBlueprint::default());
        assert!(warnings.iter().any(|w| w.contains("No sinks configured")));
    }

    #[test]
    fn test_warnings_for_unused_rate_limit() {
        let mut bp = HubBlueprint::default();
        bp.task_events.rate_limit.max_messages_per_minute = Some(100);
        bp.sinks.push(SinkConfig {
            name: "file".into(),
            sink_type: SinkType::File,
            queue_capacity: 10,
            alerts_only: true,
            params: HashMap::new(),
        });

        let warnings = collect_warnings(&bp);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("rate limiting is disabled"));
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let args = ValidateArgs {
            config: "/nonexistent/ops-hub.toml".into(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
