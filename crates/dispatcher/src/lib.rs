//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 消费 `TaskEvent`
//! - Fan-out 到多个 sinks (log / file / network)
//! - 每个 sink 独立队列与 worker，隔离慢 sink
//! - 等待 sink 确认，把失败反馈给调用方 (队列计为处理失败)

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{EventSink, TaskEvent};
pub use dispatcher::{create_dispatcher, Dispatcher};
pub use error::DispatcherError;
pub use handle::{DeliveryAck, SinkHandle};
pub use metrics::{SinkMetrics, SinkMetricsSnapshot};
pub use sinks::{FileSink, FileSinkConfig, LogSink, NetworkSink, NetworkSinkConfig};

#[cfg(test)]
pub(crate) mod test_util {
    use chrono::Utc;
    use contracts::{TaskEvent, TaskEventKind};

    pub(crate) fn sample_event(kind: TaskEventKind) -> TaskEvent {
        TaskEvent {
            kind,
            host: "node1".into(),
            task_name: "Reload sales".into(),
            app_name: "Sales".into(),
            user: "INTERNAL\\sa_scheduler".into(),
            task_id: "6a3e1f".into(),
            app_id: "b41c09".into(),
            log_timestamp: "20240101T120000.000+0100".into(),
            log_level: if kind.is_alert() { "ERROR" } else { "INFO" }.into(),
            execution_id: "e-77".into(),
            message: "Reload finished".into(),
            received_at: Utc::now(),
        }
    }
}
