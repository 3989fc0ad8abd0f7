//! QueueManager - admission control in front of the worker pool
//!
//! Decides per message whether it is accepted (size, rate, capacity), tracks
//! backpressure with hysteresis and aggregates metrics for the periodic
//! reporter. The metrics lock only ever guards O(1) bookkeeping; processing
//! futures run on the pool outside of it.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use contracts::{QueueMetricsSnapshot, QueueSettings};
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::QueueManagerConfig;
use crate::error::Result;
use crate::metrics::{DropReason, QueueMetrics};
use crate::pool::{Job, WorkerPool};
use crate::rate_limiter::RateLimiter;

/// Minimum interval between two batched drop log lines
pub const DROP_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Minimum interval between two "still under backpressure" warnings
pub const BACKPRESSURE_WARNING_INTERVAL: Duration = Duration::from_secs(60);

/// Backpressure clears below `threshold * BACKPRESSURE_RECOVERY_FACTOR`
pub const BACKPRESSURE_RECOVERY_FACTOR: f64 = 0.8;

/// Backpressure state change produced by one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackpressureEvent {
    Raised,
    Sustained,
    Cleared,
}

/// Admission-controlled processing queue for one message class
///
/// Cheap to clone; clones share the same queue, pool and metrics.
#[derive(Clone)]
pub struct QueueManager {
    shared: Arc<Shared>,
}

struct Shared {
    label: String,
    config: QueueManagerConfig,
    metrics: Mutex<QueueMetrics>,
    rate_limiter: Option<parking_lot::Mutex<RateLimiter>>,
    pool: WorkerPool,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("label", &self.shared.label)
            .field("config", &self.shared.config)
            .field("pool", &self.shared.pool)
            .finish()
    }
}

impl QueueManager {
    /// Create a queue manager
    ///
    /// # Errors
    /// Returns `InvalidConfig` when the configuration cannot be run.
    pub fn new(label: impl Into<String>, config: QueueManagerConfig) -> Result<Self> {
        config.validate()?;

        let label = label.into();
        let rate_limiter = config
            .max_messages_per_minute
            .map(|max| parking_lot::Mutex::new(RateLimiter::new(max)));

        info!(
            queue = %label,
            max_concurrent = config.max_concurrent,
            max_size = config.max_size,
            backpressure_threshold = config.backpressure_threshold,
            rate_limit = ?config.max_messages_per_minute,
            max_message_size = config.max_message_size,
            "queue manager initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                pool: WorkerPool::new(config.max_concurrent),
                metrics: Mutex::new(QueueMetrics::new(Instant::now())),
                rate_limiter,
                label,
                config,
            }),
        })
    }

    /// Create a queue manager from the `[task_events]` section of a blueprint
    pub fn from_settings(label: impl Into<String>, settings: &QueueSettings) -> Result<Self> {
        Self::new(label, QueueManagerConfig::try_from(settings)?)
    }

    /// Queue label used in logs and metrics
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Resolved configuration (defaults and validation already applied)
    pub fn config(&self) -> &QueueManagerConfig {
        &self.shared.config
    }

    /// Whether `message` fits within `max_message_size` bytes
    pub fn validate_message_size(&self, message: impl AsRef<[u8]>) -> bool {
        message.as_ref().len() <= self.shared.config.max_message_size
    }

    /// Take one admission from the rate limiter (always `true` when disabled)
    pub fn check_rate_limit(&self) -> bool {
        match &self.shared.rate_limiter {
            Some(limiter) => limiter.lock().check_limit(),
            None => true,
        }
    }

    /// Admit `process` to the queue
    ///
    /// Returns `true` once the future is scheduled and `false` when the queue
    /// is full. Never waits for `process` to run; its outcome is only
    /// reflected in the metrics.
    pub async fn add_to_queue<F, E>(&self, process: F) -> bool
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let job: Job = Box::pin(execute(Arc::clone(&self.shared), process));

        let (admitted, observed_size) = {
            let mut metrics = self.shared.metrics.lock().await;
            metrics.refresh_windows(Instant::now());
            metrics.record_received();

            match self.shared.pool.try_submit(job, self.shared.config.max_size) {
                Ok(size) => {
                    metrics.record_queued();
                    (true, size)
                }
                Err(_rejected) => {
                    metrics.record_drop(DropReason::QueueFull);
                    (false, self.shared.pool.size())
                }
            }
        };

        if admitted {
            observability::record_admission(&self.shared.label, "accepted");
            self.check_backpressure(observed_size).await;
        } else {
            observability::record_admission(&self.shared.label, DropReason::QueueFull.as_str());
            debug!(
                queue = %self.shared.label,
                queue_size = observed_size,
                "queue full, message dropped"
            );
            self.flush_drop_log().await;
        }

        admitted
    }

    /// Account for a message rejected by [`check_rate_limit`](Self::check_rate_limit)
    pub async fn handle_rate_limit_drop(&self) {
        self.record_early_drop(DropReason::RateLimit).await;
    }

    /// Account for a message rejected by [`validate_message_size`](Self::validate_message_size)
    pub async fn handle_size_drop(&self) {
        self.record_early_drop(DropReason::Size).await;
    }

    async fn record_early_drop(&self, reason: DropReason) {
        {
            let mut metrics = self.shared.metrics.lock().await;
            metrics.refresh_windows(Instant::now());
            metrics.record_received();
            metrics.record_drop(reason);
        }
        observability::record_admission(&self.shared.label, reason.as_str());
        self.flush_drop_log().await;
    }

    /// Emit the batched drop count, at most once per [`DROP_LOG_INTERVAL`]
    async fn flush_drop_log(&self) {
        let dropped = {
            let mut metrics = self.shared.metrics.lock().await;
            metrics.take_drop_log(Instant::now(), DROP_LOG_INTERVAL)
        };

        if let Some(dropped) = dropped {
            warn!(
                queue = %self.shared.label,
                dropped,
                interval_secs = DROP_LOG_INTERVAL.as_secs(),
                "messages dropped since last report"
            );
        }
    }

    /// Update backpressure state from a queue size observed at admission
    ///
    /// Raised at `utilization >= threshold`, cleared below
    /// `threshold * 0.8`; in between the previous state is kept.
    pub async fn check_backpressure(&self, observed_queue_size: usize) {
        let config = &self.shared.config;
        let utilization = utilization_pct(observed_queue_size, config.max_size);
        let threshold = config.backpressure_threshold;
        let recovery = threshold * BACKPRESSURE_RECOVERY_FACTOR;

        let event = {
            let mut metrics = self.shared.metrics.lock().await;
            let now = Instant::now();

            if !metrics.backpressure_active {
                if utilization >= threshold {
                    metrics.backpressure_active = true;
                    metrics.last_backpressure_warning = Some(now);
                    Some(BackpressureEvent::Raised)
                } else {
                    None
                }
            } else if utilization < recovery {
                metrics.backpressure_active = false;
                Some(BackpressureEvent::Cleared)
            } else if metrics.last_backpressure_warning.is_none_or(|last| {
                now.saturating_duration_since(last) >= BACKPRESSURE_WARNING_INTERVAL
            }) {
                metrics.last_backpressure_warning = Some(now);
                Some(BackpressureEvent::Sustained)
            } else {
                None
            }
        };

        match event {
            Some(BackpressureEvent::Raised) => {
                observability::record_backpressure(&self.shared.label, true);
                warn!(
                    queue = %self.shared.label,
                    queue_size = observed_queue_size,
                    max_size = config.max_size,
                    utilization_pct = format!("{utilization:.1}"),
                    threshold_pct = threshold,
                    "backpressure activated"
                );
            }
            Some(BackpressureEvent::Sustained) => {
                warn!(
                    queue = %self.shared.label,
                    queue_size = observed_queue_size,
                    utilization_pct = format!("{utilization:.1}"),
                    "still under backpressure"
                );
            }
            Some(BackpressureEvent::Cleared) => {
                observability::record_backpressure(&self.shared.label, false);
                info!(
                    queue = %self.shared.label,
                    queue_size = observed_queue_size,
                    utilization_pct = format!("{utilization:.1}"),
                    recovery_pct = recovery,
                    "backpressure cleared"
                );
            }
            None => {}
        }
    }

    /// Whether backpressure is currently active
    pub async fn is_backpressure_active(&self) -> bool {
        self.shared.metrics.lock().await.backpressure_active
    }

    /// Snapshot of all metrics
    pub async fn get_metrics(&self) -> QueueMetricsSnapshot {
        let rate_limit_current = self.current_rate();
        let max_size = self.shared.config.max_size;

        let mut metrics = self.shared.metrics.lock().await;
        metrics.refresh_windows(Instant::now());

        let queue_size = self.shared.pool.size();
        let times = &metrics.processing_times;

        QueueMetricsSnapshot {
            queue_size: queue_size as u64,
            queue_max_size: max_size as u64,
            queue_utilization_pct: utilization_pct(queue_size, max_size),
            queue_pending: self.shared.pool.pending() as u64,

            messages_received: metrics.messages_received,
            messages_received_last_minute: metrics.last_minute.received,
            messages_received_last_hour: metrics.last_hour.received,
            messages_queued: metrics.messages_queued,
            messages_processed: metrics.messages_processed,
            messages_processed_last_minute: metrics.last_minute.processed,
            messages_processed_last_hour: metrics.last_hour.processed,
            messages_processed_successful: metrics
                .messages_processed
                .saturating_sub(metrics.messages_failed),
            messages_failed: metrics.messages_failed,

            messages_dropped_total: metrics.messages_dropped_total,
            messages_dropped_rate_limit: metrics.dropped_rate_limit,
            messages_dropped_queue_full: metrics.dropped_queue_full,
            messages_dropped_size: metrics.dropped_size,

            processing_time_avg_ms: times.average().unwrap_or(0.0),
            processing_time_p95_ms: times.percentile_95().unwrap_or(0.0),
            processing_time_p99_ms: times.percentile_99().unwrap_or(0.0),
            processing_time_max_ms: times.max().unwrap_or(0.0),

            rate_limit_current,
            backpressure_active: u8::from(metrics.backpressure_active),
        }
    }

    /// Reset cumulative counters and latency history
    ///
    /// Queue contents, rolling windows and backpressure state are untouched.
    #[instrument(name = "queue_clear_metrics", skip(self), fields(queue = %self.shared.label))]
    pub async fn clear_metrics(&self) {
        self.shared.metrics.lock().await.reset_counters();
        debug!(queue = %self.shared.label, "metrics cleared");
    }

    fn current_rate(&self) -> u64 {
        self.shared
            .rate_limiter
            .as_ref()
            .map(|limiter| limiter.lock().current_rate())
            .unwrap_or(0)
    }

    /// Admitted messages waiting for a slot
    pub fn queue_size(&self) -> usize {
        self.shared.pool.size()
    }

    /// Messages currently being processed
    pub fn pending(&self) -> usize {
        self.shared.pool.pending()
    }

    /// Resolve once every admitted message has finished processing
    pub async fn wait_idle(&self) {
        self.shared.pool.wait_idle().await;
    }
}

fn utilization_pct(queue_size: usize, max_size: usize) -> f64 {
    if max_size == 0 {
        0.0
    } else {
        queue_size as f64 / max_size as f64 * 100.0
    }
}

/// Run one admitted message and record its outcome
async fn execute<F, E>(shared: Arc<Shared>, process: F)
where
    F: Future<Output = std::result::Result<(), E>>,
    E: Display,
{
    let started = Instant::now();
    // A panic is a failed message, not a lost one
    let outcome = AssertUnwindSafe(process).catch_unwind().await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some((e.to_string(), "message processing failed")),
        Err(panic) => Some((panic_message(&*panic), "message processing panicked")),
    };

    {
        let mut metrics = shared.metrics.lock().await;
        metrics.refresh_windows(Instant::now());
        metrics.record_completion(elapsed_ms, failure.is_some());
    }
    observability::record_processing(&shared.label, elapsed_ms, failure.is_none());

    if let Some((error, message)) = failure {
        error!(
            queue = %shared.label,
            error = %error,
            elapsed_ms = format!("{elapsed_ms:.1}"),
            "{message}"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
