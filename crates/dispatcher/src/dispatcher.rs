//! Dispatcher - fan-out of task events to sinks

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use contracts::{SinkConfig, SinkType, TaskEvent};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::SinkMetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let capacity = config.queue_capacity;
    let alerts_only = config.alerts_only;

    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, capacity, alerts_only))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, capacity, alerts_only))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, capacity, alerts_only))
        }
    }
}

/// Fans task events out to every configured sink
///
/// Cheap to clone; each clone delivers to the same sink workers. A
/// `dispatch` future is `'static`, so it can be handed to the ingestion
/// queue as the processing step of one message.
#[derive(Clone)]
pub struct Dispatcher {
    handles: Arc<Vec<SinkHandle>>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>) -> Self {
        Self {
            handles: Arc::new(handles),
        }
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, SinkMetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Deliver `event` to every sink and wait for all of them
    ///
    /// Events are queued on all sinks first, so slow sinks write in
    /// parallel. Fails if any sink rejected or failed the event; the other
    /// sinks still receive it.
    pub async fn dispatch(&self, event: TaskEvent) -> Result<(), DispatcherError> {
        let event = Arc::new(event);

        let mut failures = Vec::new();
        let mut pending = Vec::with_capacity(self.handles.len());

        for handle in self.handles.iter() {
            match handle.submit(Arc::clone(&event)) {
                Ok(Some(ack)) => pending.push((handle, ack)),
                Ok(None) => {}
                Err(e) => failures.push(e.to_string()),
            }
        }

        for (handle, ack) in pending {
            if let Err(e) = handle.await_ack(ack).await {
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            debug!(task_id = %event.task_id, kind = %event.kind, "Event dispatched");
            Ok(())
        } else {
            Err(DispatcherError::Delivery {
                task_id: event.task_id.clone(),
                failures,
            })
        }
    }

    /// Close all sinks after their queued events are written
    ///
    /// Requires the last clone; with clones still alive the workers keep
    /// running until those are dropped.
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        match Arc::try_unwrap(self.handles) {
            Ok(handles) => {
                for handle in handles {
                    handle.shutdown().await;
                }
                info!("Dispatcher shutdown complete");
            }
            Err(handles) => {
                warn!(
                    references = Arc::strong_count(&handles),
                    "Dispatcher still referenced, sinks close when the last clone drops"
                );
            }
        }
    }
}

/// Create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs), fields(sink_count = sink_configs.len()))]
pub async fn create_dispatcher(sink_configs: &[SinkConfig]) -> Result<Dispatcher, DispatcherError> {
    let mut handles = Vec::with_capacity(sink_configs.len());
    for sink_config in sink_configs {
        handles.push(create_sink_handle(sink_config).await?);
    }

    info!(sinks = handles.len(), "Dispatcher created");
    Ok(Dispatcher::with_handles(handles))
}
