//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Sink queue full - event not delivered to this sink
    #[error("queue full for sink '{sink_name}', task {task_id} not delivered")]
    QueueFull { sink_name: String, task_id: String },

    /// Sink worker is gone
    #[error("sink '{sink_name}' worker closed")]
    WorkerClosed { sink_name: String },

    /// One or more sinks failed for an event
    #[error("delivery of task {task_id} failed: {}", .failures.join("; "))]
    Delivery {
        task_id: String,
        failures: Vec<String>,
    },

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_lists_failures() {
        let err = DispatcherError::Delivery {
            task_id: "t-1".into(),
            failures: vec!["queue full for sink 'a'".into(), "sink 'b' worker closed".into()],
        };
        assert_eq!(
            err.to_string(),
            "delivery of task t-1 failed: queue full for sink 'a'; sink 'b' worker closed"
        );
    }
}
