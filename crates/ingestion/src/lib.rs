//! # Ingestion
//!
//! Admission control between the UDP receiver and event processing.
//!
//! Responsibilities:
//! - Size and rate pre-filters (`validate_message_size`, `check_rate_limit`)
//! - Bounded, concurrency-limited queue with capacity rejection
//! - Backpressure detection with hysteresis
//! - Metrics aggregation (counters, rolling windows, latency percentiles)
//! - Parsing and sanitizing scheduler task event datagrams
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{parse_task_event, QueueManager};
//!
//! let queue = QueueManager::from_settings("task_events", &blueprint.task_events)?;
//!
//! if !queue.validate_message_size(&datagram) {
//!     queue.handle_size_drop().await;
//! } else if !queue.check_rate_limit() {
//!     queue.handle_rate_limit_drop().await;
//! } else {
//!     let event = parse_task_event(&datagram)?;
//!     let dispatcher = dispatcher.clone();
//!     queue.add_to_queue(async move { dispatcher.dispatch(event).await }).await;
//! }
//! ```

mod circular_buffer;
mod config;
mod error;
mod metrics;
mod parser;
mod pool;
mod queue_manager;
mod rate_limiter;
mod sanitize;

// Re-exports
pub use circular_buffer::CircularBuffer;
pub use config::QueueManagerConfig;
pub use error::{IngestionError, Result};
pub use metrics::{DropReason, PROCESSING_TIME_SAMPLES};
pub use parser::{parse_task_event, TASK_EVENT_FIELDS};
pub use pool::{Job, WorkerPool};
pub use queue_manager::{
    QueueManager, BACKPRESSURE_RECOVERY_FACTOR, BACKPRESSURE_WARNING_INTERVAL, DROP_LOG_INTERVAL,
};
pub use rate_limiter::{RateLimiter, RATE_LIMIT_WINDOW};
pub use sanitize::{sanitize, sanitize_field, DEFAULT_MAX_FIELD_LENGTH};
