//! SinkHandle - manages a sink with isolated queue and worker task

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, EventSink, TaskEvent};

use crate::error::DispatcherError;
use crate::metrics::SinkMetrics;

/// Acknowledgement for one delivered event
pub type DeliveryAck = oneshot::Receiver<Result<(), ContractError>>;

/// One event queued for a sink worker
struct DeliveryRequest {
    event: Arc<TaskEvent>,
    ack: oneshot::Sender<Result<(), ContractError>>,
}

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    alerts_only: bool,
    tx: mpsc::Sender<DeliveryRequest>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: EventSink + 'static>(sink: S, queue_capacity: usize, alerts_only: bool) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            alerts_only,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this sink only receives failure/aborted events
    pub fn alerts_only(&self) -> bool {
        self.alerts_only
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue an event for the sink (non-blocking)
    ///
    /// Returns `Ok(None)` when the sink filters the event out, otherwise a
    /// receiver resolving once the sink has written it.
    pub fn submit(&self, event: Arc<TaskEvent>) -> Result<Option<DeliveryAck>, DispatcherError> {
        if self.alerts_only && !event.kind.is_alert() {
            self.metrics.inc_skipped_count();
            return Ok(None);
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        let request = DeliveryRequest { event, ack: ack_tx };

        match self.tx.try_send(request) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                Ok(Some(ack_rx))
            }
            Err(mpsc::error::TrySendError::Full(request)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    task_id = %request.event.task_id,
                    "Queue full, event not delivered"
                );
                Err(DispatcherError::QueueFull {
                    sink_name: self.name.clone(),
                    task_id: request.event.task_id.clone(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                Err(DispatcherError::WorkerClosed {
                    sink_name: self.name.clone(),
                })
            }
        }
    }

    /// Queue an event and wait until the sink has written it
    pub async fn deliver(&self, event: Arc<TaskEvent>) -> Result<(), DispatcherError> {
        match self.submit(event)? {
            Some(ack) => self.await_ack(ack).await,
            None => Ok(()),
        }
    }

    pub(crate) async fn await_ack(&self, ack: DeliveryAck) -> Result<(), DispatcherError> {
        match ack.await {
            Ok(result) => result.map_err(DispatcherError::from),
            Err(_) => Err(DispatcherError::WorkerClosed {
                sink_name: self.name.clone(),
            }),
        }
    }

    /// Shutdown the sink worker gracefully
    ///
    /// Events already queued are still written before the sink is closed.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes events and writes them to the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: EventSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<DeliveryRequest>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(DeliveryRequest { event, ack }) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        let mut result = sink.write(&event).await;

        // Burst drained: push buffered output out
        if result.is_ok() && rx.is_empty() {
            result = sink.flush().await;
        }

        match &result {
            Ok(()) => metrics.inc_write_count(),
            Err(e) => {
                metrics.inc_failure_count();
                error!(
                    sink = %name,
                    task_id = %event.task_id,
                    error = %e,
                    "Write failed"
                );
            }
        }
        observability::record_event_dispatched(&name, result.is_ok());

        // Receiver may have given up; the write outcome is already recorded
        let _ = ack.send(result);
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::sample_event;
    use contracts::TaskEventKind;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    /// Mock sink for testing
    struct MockSink {
        name: String,
        write_count: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl MockSink {
        fn new(name: &str, write_count: &Arc<AtomicU64>) -> Self {
            Self {
                name: name.to_string(),
                write_count: Arc::clone(write_count),
                should_fail: false,
                delay_ms: 0,
            }
        }
    }

    impl EventSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _event: &TaskEvent) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.write_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_deliver_waits_for_write() {
        let write_count = Arc::new(AtomicU64::new(0));
        let handle = SinkHandle::spawn(MockSink::new("test", &write_count), 10, false);

        for _ in 0..5 {
            let event = Arc::new(sample_event(TaskEventKind::Failure));
            handle.deliver(event).await.unwrap();
        }
        assert_eq!(write_count.load(Ordering::Relaxed), 5);
        assert_eq!(handle.metrics().write_count(), 5);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_full_rejects() {
        let write_count = Arc::new(AtomicU64::new(0));
        let mut sink = MockSink::new("slow", &write_count);
        sink.delay_ms = 100;

        let handle = SinkHandle::spawn(sink, 2, false);

        let mut rejected = 0;
        for _ in 0..10 {
            let event = Arc::new(sample_event(TaskEventKind::Failure));
            if let Err(DispatcherError::QueueFull { sink_name, .. }) = handle.submit(event) {
                assert_eq!(sink_name, "slow");
                rejected += 1;
            }
        }

        assert!(rejected > 0);
        assert_eq!(handle.metrics().dropped_count(), rejected);

        handle.shutdown().await;
        // Accepted events are written before shutdown completes
        assert_eq!(write_count.load(Ordering::Relaxed), 10 - rejected);
    }

    #[tokio::test]
    async fn test_failure_is_acknowledged() {
        let mut sink = MockSink::new("failing", &Arc::new(AtomicU64::new(0)));
        sink.should_fail = true;

        let handle = SinkHandle::spawn(sink, 10, false);

        let err = handle
            .deliver(Arc::new(sample_event(TaskEventKind::Failure)))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatcherError::Contract(ContractError::SinkWrite { .. })));
        assert_eq!(handle.metrics().failure_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_alerts_only_skips_success() {
        let write_count = Arc::new(AtomicU64::new(0));
        let handle = SinkHandle::spawn(MockSink::new("alerts", &write_count), 10, true);

        handle
            .deliver(Arc::new(sample_event(TaskEventKind::Success)))
            .await
            .unwrap();
        handle
            .deliver(Arc::new(sample_event(TaskEventKind::Aborted)))
            .await
            .unwrap();

        assert_eq!(write_count.load(Ordering::Relaxed), 1);
        assert_eq!(handle.metrics().skipped_count(), 1);

        handle.shutdown().await;
    }
}
