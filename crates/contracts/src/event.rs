//! TaskEvent - scheduler task notification
//!
//! One event per task reload/execution outcome reported by the scheduler.
//! All free-text fields are already sanitized when an event is constructed
//! by the ingestion layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome reported by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    /// Task finished successfully
    Success,
    /// Task failed
    Failure,
    /// Task was aborted by a user or the scheduler
    Aborted,
}

impl TaskEventKind {
    /// Topic prefix used on the wire (`/scheduler-task-failed/` etc.)
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic.trim() {
            "/scheduler-task-success/" => Some(Self::Success),
            "/scheduler-task-failed/" => Some(Self::Failure),
            "/scheduler-task-aborted/" => Some(Self::Aborted),
            _ => None,
        }
    }

    /// Stable lowercase label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Aborted => "aborted",
        }
    }

    /// Whether the event represents a problem operators should be alerted about
    pub fn is_alert(&self) -> bool {
        !matches!(self, Self::Success)
    }
}

impl fmt::Display for TaskEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler task event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Event outcome
    pub kind: TaskEventKind,

    /// Host the scheduler ran on
    pub host: String,

    /// Task name
    pub task_name: String,

    /// App (document) name the task belongs to
    pub app_name: String,

    /// User that owns the task
    pub user: String,

    /// Task ID
    pub task_id: String,

    /// App ID
    pub app_id: String,

    /// Timestamp as written in the scheduler log (kept verbatim)
    pub log_timestamp: String,

    /// Log level reported by the scheduler
    pub log_level: String,

    /// Execution ID
    pub execution_id: String,

    /// Log message
    pub message: String,

    /// Time the hub received the datagram
    pub received_at: DateTime<Utc>,
}

impl TaskEvent {
    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "task '{}' ({}) on {}: {}",
            self.task_name, self.task_id, self.host, self.kind
        )
    }
}
