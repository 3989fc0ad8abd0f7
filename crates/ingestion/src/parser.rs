//! Scheduler UDP datagram parser
//!
//! Datagram layout (`;` separated):
//!
//! ```text
//! topic;host;task_name;app_name;user;task_id;app_id;log_timestamp;log_level;execution_id;message
//! ```
//!
//! The message is the last field and may itself contain `;`.

use chrono::Utc;
use contracts::{TaskEvent, TaskEventKind};
use tracing::trace;

use crate::error::{IngestionError, Result};
use crate::sanitize::sanitize;

/// Number of `;` separated fields in a task event datagram
pub const TASK_EVENT_FIELDS: usize = 11;

/// Parse one scheduler task event datagram
///
/// Invalid UTF-8 is replaced rather than rejected. Every field is sanitized.
pub fn parse_task_event(datagram: &[u8]) -> Result<TaskEvent> {
    let text = String::from_utf8_lossy(datagram);
    let text = text.trim_end_matches(['\r', '\n']);

    let fields: Vec<&str> = text.splitn(TASK_EVENT_FIELDS, ';').collect();
    if fields.len() < TASK_EVENT_FIELDS {
        return Err(IngestionError::malformed(format!(
            "expected {} fields, got {}",
            TASK_EVENT_FIELDS,
            fields.len()
        )));
    }

    let kind = TaskEventKind::from_topic(fields[0]).ok_or_else(|| IngestionError::UnknownTopic {
        topic: sanitize(fields[0].trim()),
    })?;

    let field = |i: usize| sanitize(fields[i].trim());

    let event = TaskEvent {
        kind,
        host: field(1),
        task_name: field(2),
        app_name: field(3),
        user: field(4),
        task_id: field(5),
        app_id: field(6),
        log_timestamp: field(7),
        log_level: field(8),
        execution_id: field(9),
        message: field(10),
        received_at: Utc::now(),
    };

    if event.task_id.is_empty() {
        return Err(IngestionError::malformed("empty task id"));
    }

    trace!(task_id = %event.task_id, kind = %event.kind, "task event parsed");
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAILED: &str = "/scheduler-task-failed/;node1;Reload sales;Sales;INTERNAL\\sa_scheduler;\
        6a3e1f;b41c09;20240101T120000.000+0100;ERROR;e-77;Reload failed; connection lost";

    #[test]
    fn test_parse_failed_event() {
        let event = parse_task_event(FAILED.as_bytes()).unwrap();
        assert_eq!(event.kind, TaskEventKind::Failure);
        assert_eq!(event.host, "node1");
        assert_eq!(event.task_name, "Reload sales");
        assert_eq!(event.app_name, "Sales");
        assert_eq!(event.user, "INTERNAL\\sa_scheduler");
        assert_eq!(event.task_id, "6a3e1f");
        assert_eq!(event.app_id, "b41c09");
        assert_eq!(event.log_level, "ERROR");
        assert_eq!(event.execution_id, "e-77");
        // The message keeps its own separators
        assert_eq!(event.message, "Reload failed; connection lost");
    }

    #[test]
    fn test_parse_strips_control_characters() {
        let datagram = "/scheduler-task-success/;node1\x00;Task\x1F;App;u;t-1;a-1;ts;INFO;e;done\r\n";
        let event = parse_task_event(datagram.as_bytes()).unwrap();
        assert_eq!(event.kind, TaskEventKind::Success);
        assert_eq!(event.host, "node1");
        assert_eq!(event.task_name, "Task");
        assert_eq!(event.message, "done");
    }

    #[test]
    fn test_parse_truncates_long_message() {
        let datagram = format!(
            "/scheduler-task-aborted/;h;t;a;u;t-1;a-1;ts;WARN;e;{}",
            "x".repeat(2000)
        );
        let event = parse_task_event(datagram.as_bytes()).unwrap();
        assert_eq!(event.kind, TaskEventKind::Aborted);
        assert_eq!(event.message.len(), 500);
    }

    #[test]
    fn test_parse_too_few_fields() {
        let err = parse_task_event(b"/scheduler-task-failed/;node1;task").unwrap_err();
        assert!(matches!(err, IngestionError::MalformedDatagram { .. }));
    }

    #[test]
    fn test_parse_unknown_topic() {
        let err = parse_task_event(b"/scheduler-reload/;h;t;a;u;t-1;a-1;ts;INFO;e;m").unwrap_err();
        match err {
            IngestionError::UnknownTopic { topic } => assert_eq!(topic, "/scheduler-reload/"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_empty_task_id() {
        let err = parse_task_event(b"/scheduler-task-failed/;h;t;a;u; ;a-1;ts;INFO;e;m").unwrap_err();
        assert!(matches!(err, IngestionError::MalformedDatagram { .. }));
    }

    #[test]
    fn test_parse_invalid_utf8_is_lossy() {
        let mut datagram = b"/scheduler-task-failed/;h;t;a;u;t-1;a-1;ts;INFO;e;bad ".to_vec();
        datagram.push(0xFF);
        let event = parse_task_event(&datagram).unwrap();
        assert!(event.message.starts_with("bad "));
    }
}
