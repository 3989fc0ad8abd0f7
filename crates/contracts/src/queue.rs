//! Admission-control queue contracts shared across crates.
//!
//! Configuration consumed by the ingestion `QueueManager` and the flat metrics
//! record it exports to the reporting path.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Bounded worker queue settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MessageQueueConfig {
    /// Maximum number of messages processed concurrently
    #[serde(default = "default_max_concurrent")]
    #[validate(range(min = 1, message = "max_concurrent must be > 0"))]
    pub max_concurrent: usize,

    /// Maximum number of admitted messages waiting for a free slot
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Queue utilization (percent) at which backpressure is raised
    #[serde(default = "default_backpressure_threshold")]
    #[validate(range(
        min = 0.0,
        max = 100.0,
        message = "backpressure_threshold must be within 0..=100"
    ))]
    pub backpressure_threshold: f64,
}

impl Default for MessageQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_size: default_max_size(),
            backpressure_threshold: default_backpressure_threshold(),
        }
    }
}

fn default_max_concurrent() -> usize {
    10
}

fn default_max_size() -> usize {
    200
}

fn default_backpressure_threshold() -> f64 {
    80.0
}

/// Fixed-window rate limit settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Enable the limiter
    #[serde(default)]
    pub enable: bool,

    /// Admissions allowed per 60 s window (required when enabled)
    #[serde(default)]
    #[validate(range(min = 1, message = "max_messages_per_minute must be > 0"))]
    pub max_messages_per_minute: Option<u32>,
}

/// Full settings for one queue class
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueueSettings {
    /// Worker queue
    #[serde(default)]
    #[validate(nested)]
    pub message_queue: MessageQueueConfig,

    /// Rate limiter
    #[serde(default)]
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,

    /// Maximum accepted message size in bytes
    #[serde(default = "default_max_message_size")]
    #[validate(range(min = 1, message = "max_message_size must be > 0"))]
    pub max_message_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            message_queue: MessageQueueConfig::default(),
            rate_limit: RateLimitConfig::default(),
            max_message_size: default_max_message_size(),
        }
    }
}

/// Largest IPv4 UDP payload
fn default_max_message_size() -> usize {
    65_507
}

/// Flat metrics record exported by a queue
///
/// Field names serialize in camelCase, matching the shape written to the
/// time-series back end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMetricsSnapshot {
    pub queue_size: u64,
    pub queue_max_size: u64,
    pub queue_utilization_pct: f64,
    pub queue_pending: u64,

    pub messages_received: u64,
    pub messages_received_last_minute: u64,
    pub messages_received_last_hour: u64,
    pub messages_queued: u64,
    pub messages_processed: u64,
    pub messages_processed_last_minute: u64,
    pub messages_processed_last_hour: u64,
    pub messages_processed_successful: u64,
    pub messages_failed: u64,

    pub messages_dropped_total: u64,
    pub messages_dropped_rate_limit: u64,
    pub messages_dropped_queue_full: u64,
    pub messages_dropped_size: u64,

    pub processing_time_avg_ms: f64,
    pub processing_time_p95_ms: f64,
    pub processing_time_p99_ms: f64,
    pub processing_time_max_ms: f64,

    /// Extrapolated admissions per minute (0 when limiting is disabled)
    pub rate_limit_current: u64,

    /// 1 while backpressure is active, else 0
    pub backpressure_active: u8,
}

impl fmt::Display for QueueMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Queue: size={}/{} ({:.1}%), running={}, backpressure={}",
            self.queue_size,
            self.queue_max_size,
            self.queue_utilization_pct,
            self.queue_pending,
            self.backpressure_active == 1
        )?;
        writeln!(
            f,
            "Messages: received={} queued={} processed={} ok={} failed={}",
            self.messages_received,
            self.messages_queued,
            self.messages_processed,
            self.messages_processed_successful,
            self.messages_failed
        )?;
        writeln!(
            f,
            "Dropped: total={} rate_limit={} queue_full={} size={}",
            self.messages_dropped_total,
            self.messages_dropped_rate_limit,
            self.messages_dropped_queue_full,
            self.messages_dropped_size
        )?;
        write!(
            f,
            "Processing (ms): avg={:.2} p95={:.2} p99={:.2} max={:.2}",
            self.processing_time_avg_ms,
            self.processing_time_p95_ms,
            self.processing_time_p99_ms,
            self.processing_time_max_ms
        )
    }
}
