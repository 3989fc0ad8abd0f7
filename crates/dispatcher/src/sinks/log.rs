//! LogSink - logs task events via tracing

use contracts::{ContractError, EventSink, TaskEvent};
use tracing::{info, instrument, warn};

/// Sink that logs event summaries
///
/// Alerts (failure / aborted) are logged at `WARN`, successes at `INFO`.
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_event(&self, event: &TaskEvent) {
        if event.kind.is_alert() {
            warn!(
                sink = %self.name,
                kind = %event.kind,
                task_id = %event.task_id,
                task_name = %event.task_name,
                app_name = %event.app_name,
                host = %event.host,
                user = %event.user,
                execution_id = %event.execution_id,
                message = %event.message,
                "Scheduler task alert"
            );
        } else {
            info!(
                sink = %self.name,
                kind = %event.kind,
                task_id = %event.task_id,
                task_name = %event.task_name,
                host = %event.host,
                "Scheduler task completed"
            );
        }
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, event),
        fields(sink = %self.name, task_id = %event.task_id)
    )]
    async fn write(&mut self, event: &TaskEvent) -> Result<(), ContractError> {
        self.log_event(event);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
