//! Pipeline orchestrator - coordinates all components.
//!
//! UDP socket → `QueueManager` (admission) → `Dispatcher` (sinks), plus the
//! periodic metrics reporter. Shutdown stops the listener first, drains the
//! queue, then closes the sinks.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::HubBlueprint;
use ingestion::QueueManager;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{info, warn};

use super::listener::run_listener;
use super::reporter::MetricsReporter;
use super::PipelineStats;
use crate::error::CliError;

/// Label of the task event queue in logs and metrics
const TASK_EVENT_QUEUE: &str = "task_events";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The hub configuration
    pub blueprint: HubBlueprint,

    /// Stop after this long (None = run until the shutdown signal)
    pub timeout: Option<Duration>,

    /// How long to wait for admitted events on shutdown
    pub drain_timeout: Duration,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves or the timeout elapses
    pub async fn run<S>(self, shutdown: S) -> Result<PipelineStats>
    where
        S: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let queue = QueueManager::from_settings(TASK_EVENT_QUEUE, &blueprint.task_events)
            .map_err(|e| CliError::pipeline_setup(e.to_string()))?;

        info!(
            max_concurrent = queue.config().max_concurrent,
            max_size = queue.config().max_size,
            rate_limit = ?queue.config().max_messages_per_minute,
            "Task event queue configured"
        );

        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - admitted events are only counted");
        }

        let dispatcher = dispatcher::create_dispatcher(&blueprint.sinks)
            .await
            .context("Failed to create dispatcher")?;
        let active_sinks = dispatcher.sink_count();

        let bind_addr = blueprint.udp_bind_addr();
        let socket = UdpSocket::bind(&bind_addr)
            .await
            .map_err(|e| CliError::bind(bind_addr.clone(), e))?;
        info!(addr = %bind_addr, "UDP listener bound");

        let (listener_stop_tx, listener_stop_rx) = watch::channel(false);
        let (reporter_stop_tx, reporter_stop_rx) = watch::channel(false);

        let reporter = blueprint.metrics.enable.then(|| {
            MetricsReporter::new(
                queue.clone(),
                dispatcher.clone(),
                Duration::from_millis(blueprint.metrics.write_frequency_ms),
            )
            .spawn(reporter_stop_rx)
        });

        let listener = tokio::spawn(run_listener(
            socket,
            queue.clone(),
            dispatcher.clone(),
            listener_stop_rx,
        ));

        info!("Pipeline running");

        match self.config.timeout {
            Some(timeout) => {
                tokio::select! {
                    _ = shutdown => {},
                    _ = tokio::time::sleep(timeout) => {
                        info!(timeout_secs = timeout.as_secs(), "Pipeline timeout reached");
                    }
                }
            }
            None => shutdown.await,
        }

        info!("Shutting down pipeline...");

        // Listener first so nothing new is admitted while draining
        if listener_stop_tx.send(true).is_err() {
            warn!("UDP listener already stopped");
        }
        let listener_stats = listener
            .await
            .map_err(|e| CliError::shutdown(format!("listener task failed: {e}")))?;

        let drain_timeout = self.config.drain_timeout;
        if tokio::time::timeout(drain_timeout, queue.wait_idle())
            .await
            .is_err()
        {
            warn!(
                drain_timeout_secs = drain_timeout.as_secs(),
                waiting = queue.queue_size(),
                running = queue.pending(),
                "Queue not drained before timeout, abandoning remaining events"
            );
        }

        // Final report covers the drained events
        if reporter_stop_tx.send(true).is_err() && reporter.is_some() {
            warn!("Metrics reporter already stopped");
        }
        let queue_summary = match reporter {
            Some(handle) => Some(
                handle
                    .await
                    .map_err(|e| CliError::shutdown(format!("reporter task failed: {e}")))?
                    .summary(),
            ),
            None => None,
        };

        let sink_metrics = dispatcher.metrics();
        dispatcher.shutdown().await;

        let mut stats = PipelineStats {
            active_sinks,
            queue_summary,
            sink_metrics,
            ..Default::default()
        };
        stats.apply_listener(&listener_stats);
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkType};
    use std::collections::HashMap;

    fn config(blueprint: HubBlueprint) -> PipelineConfig {
        PipelineConfig {
            blueprint,
            timeout: None,
            drain_timeout: Duration::from_secs(5),
            metrics_port: None,
        }
    }

    fn local_blueprint() -> HubBlueprint {
        let mut bp = HubBlueprint::default();
        bp.udp.host = "127.0.0.1".into();
        bp.udp.port = 0;
        bp
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let stats = Pipeline::new(config(local_blueprint()))
            .run(async {})
            .await
            .unwrap();

        assert_eq!(stats.datagrams_received, 0);
        assert_eq!(stats.active_sinks, 0);
        // Final report is always produced when reporting is enabled
        assert_eq!(stats.queue_summary.map(|s| s.reports), Some(1));
    }

    #[tokio::test]
    async fn test_run_stops_on_timeout() {
        let mut cfg = config(local_blueprint());
        cfg.blueprint.metrics.enable = false;
        cfg.timeout = Some(Duration::from_millis(10));

        let stats = Pipeline::new(cfg)
            .run(std::future::pending())
            .await
            .unwrap();
        assert!(stats.queue_summary.is_none());
    }

    #[tokio::test]
    async fn test_invalid_sink_fails_setup() {
        let mut bp = local_blueprint();
        bp.sinks.push(SinkConfig {
            name: "net".into(),
            sink_type: SinkType::Network,
            queue_capacity: 10,
            alerts_only: false,
            params: HashMap::from([("addr".to_string(), "not-an-addr".to_string())]),
        });

        assert!(Pipeline::new(config(bp)).run(async {}).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut bp = local_blueprint();
        bp.udp.port = taken.local_addr().unwrap().port();

        let err = Pipeline::new(config(bp)).run(async {}).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Bind { .. })
        ));
    }
}
