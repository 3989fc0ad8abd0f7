//! Periodic queue metrics reporter
//!
//! 每个周期：读取快照 → 导出 / 记录 → 清零计数器。
//! 计数器因此是"每周期"值，滚动窗口 (last minute / last hour) 不受影响。

use std::time::Duration;

use dispatcher::Dispatcher;
use ingestion::QueueManager;
use observability::QueueReportAggregator;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reports one queue every `interval`
pub struct MetricsReporter {
    queue: QueueManager,
    dispatcher: Dispatcher,
    interval: Duration,
    aggregator: QueueReportAggregator,
}

impl MetricsReporter {
    pub fn new(queue: QueueManager, dispatcher: Dispatcher, interval: Duration) -> Self {
        Self {
            queue,
            dispatcher,
            interval,
            aggregator: QueueReportAggregator::new(),
        }
    }

    /// Take one snapshot, export it, then reset the queue counters
    pub async fn report_once(&mut self) {
        let snapshot = self.queue.get_metrics().await;

        observability::record_queue_metrics(self.queue.label(), &snapshot);
        self.aggregator.update(&snapshot);

        if snapshot.backpressure_active == 1 {
            warn!(
                queue = %self.queue.label(),
                queue_size = snapshot.queue_size,
                utilization_pct = snapshot.queue_utilization_pct,
                "Queue report under backpressure"
            );
        }

        info!(
            queue = %self.queue.label(),
            queue_size = snapshot.queue_size,
            pending = snapshot.queue_pending,
            received = snapshot.messages_received,
            processed = snapshot.messages_processed,
            failed = snapshot.messages_failed,
            dropped = snapshot.messages_dropped_total,
            received_last_minute = snapshot.messages_received_last_minute,
            p95_ms = format!("{:.2}", snapshot.processing_time_p95_ms),
            "Queue metrics"
        );

        for (name, sink) in self.dispatcher.metrics() {
            debug!(
                sink = %name,
                queue_len = sink.queue_len,
                writes = sink.write_count,
                failures = sink.failure_count,
                dropped = sink.dropped_count,
                skipped = sink.skipped_count,
                "Sink metrics"
            );
        }

        self.queue.clear_metrics().await;
    }

    /// Report until `shutdown` flips, then once more
    ///
    /// The task yields the aggregate of every report it produced.
    pub fn spawn(mut self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<QueueReportAggregator> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.report_once().await,
                    _ = shutdown.changed() => break,
                }
            }

            self.report_once().await;
            self.aggregator
        })
    }
}
