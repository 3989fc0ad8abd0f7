//! UDP listener - datagram → admission → dispatch
//!
//! 每个报文依次经过：大小检查 → 限流 → 解析 → 入队。
//! 入队后的处理 (分发到 sinks) 由队列的 worker 异步执行。

use dispatcher::Dispatcher;
use ingestion::{parse_task_event, IngestionError, QueueManager};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Receive buffer, large enough that oversized datagrams reach the size check
/// instead of being silently truncated
pub const RECV_BUFFER_SIZE: usize = 65_536;

/// What happened to one datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramOutcome {
    Admitted,
    DroppedSize,
    DroppedRateLimit,
    DroppedQueueFull,
    ParseError,
}

/// Per-run listener counters
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerStats {
    pub received: u64,
    pub admitted: u64,
    pub dropped_size: u64,
    pub dropped_rate_limit: u64,
    pub dropped_queue_full: u64,
    pub parse_errors: u64,
}

impl ListenerStats {
    pub fn record(&mut self, outcome: DatagramOutcome) {
        self.received += 1;
        match outcome {
            DatagramOutcome::Admitted => self.admitted += 1,
            DatagramOutcome::DroppedSize => self.dropped_size += 1,
            DatagramOutcome::DroppedRateLimit => self.dropped_rate_limit += 1,
            DatagramOutcome::DroppedQueueFull => self.dropped_queue_full += 1,
            DatagramOutcome::ParseError => self.parse_errors += 1,
        }
    }
}

/// Run one datagram through admission control
///
/// Returns as soon as the event is admitted or dropped; delivery runs on the
/// queue's workers.
pub async fn handle_datagram(
    queue: &QueueManager,
    dispatcher: &Dispatcher,
    datagram: &[u8],
) -> DatagramOutcome {
    observability::record_datagram_received(datagram.len());

    if !queue.validate_message_size(datagram) {
        queue.handle_size_drop().await;
        return DatagramOutcome::DroppedSize;
    }

    if !queue.check_rate_limit() {
        queue.handle_rate_limit_drop().await;
        return DatagramOutcome::DroppedRateLimit;
    }

    let event = match parse_task_event(datagram) {
        Ok(event) => event,
        Err(e) => {
            let reason = match e {
                IngestionError::UnknownTopic { .. } => "unknown_topic",
                _ => "malformed",
            };
            observability::record_parse_error(reason);
            warn!(error = %e, bytes = datagram.len(), "Discarding unparseable datagram");
            return DatagramOutcome::ParseError;
        }
    };

    debug!(
        task_id = %event.task_id,
        kind = %event.kind,
        host = %event.host,
        "Task event received"
    );

    let dispatcher = dispatcher.clone();
    if queue
        .add_to_queue(async move { dispatcher.dispatch(event).await })
        .await
    {
        DatagramOutcome::Admitted
    } else {
        DatagramOutcome::DroppedQueueFull
    }
}

/// Receive datagrams until `shutdown` flips (or its sender is dropped)
pub async fn run_listener(
    socket: UdpSocket,
    queue: QueueManager,
    dispatcher: Dispatcher,
    mut shutdown: watch::Receiver<bool>,
) -> ListenerStats {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let mut stats = ListenerStats::default();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, peer)) => {
                    trace!(%peer, bytes = len, "Datagram received");
                    let outcome = handle_datagram(&queue, &dispatcher, &buf[..len]).await;
                    stats.record(outcome);
                }
                Err(e) => warn!(error = %e, "UDP receive failed"),
            }
        }
    }

    info!(
        received = stats.received,
        admitted = stats.admitted,
        "UDP listener stopped"
    );
    stats
}
