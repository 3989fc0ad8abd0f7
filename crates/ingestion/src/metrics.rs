//! Queue metrics record
//!
//! Owned by `QueueManager` and only touched under its lock.

use std::time::Duration;

use tokio::time::Instant;

use crate::circular_buffer::CircularBuffer;

/// Samples kept for latency percentiles
pub const PROCESSING_TIME_SAMPLES: usize = 1000;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Received/processed counts for one rolling window
///
/// Reset lazily: a window is only checked (and zeroed once elapsed) when the
/// record is touched, so an idle period keeps stale values until the next
/// touch.
#[derive(Debug, Clone)]
pub(crate) struct RollingWindow {
    length: Duration,
    start: Instant,
    pub(crate) received: u64,
    pub(crate) processed: u64,
}

impl RollingWindow {
    fn new(length: Duration, now: Instant) -> Self {
        Self {
            length,
            start: now,
            received: 0,
            processed: 0,
        }
    }

    fn refresh(&mut self, now: Instant) {
        if now.saturating_duration_since(self.start) >= self.length {
            self.received = 0;
            self.processed = 0;
            self.start = now;
        }
    }
}

/// Drop reason recorded for a rejected message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    RateLimit,
    QueueFull,
    Size,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::QueueFull => "queue_full",
            Self::Size => "size",
        }
    }
}

#[derive(Debug)]
pub(crate) struct QueueMetrics {
    pub(crate) messages_received: u64,
    pub(crate) messages_queued: u64,
    /// Completed processings, failed ones included
    pub(crate) messages_processed: u64,
    /// Subset of `messages_processed` that returned an error or panicked
    pub(crate) messages_failed: u64,
    pub(crate) messages_dropped_total: u64,
    pub(crate) dropped_rate_limit: u64,
    pub(crate) dropped_queue_full: u64,
    pub(crate) dropped_size: u64,

    pub(crate) last_minute: RollingWindow,
    pub(crate) last_hour: RollingWindow,

    pub(crate) processing_times: CircularBuffer,

    pub(crate) backpressure_active: bool,
    pub(crate) last_backpressure_warning: Option<Instant>,
    pub(crate) dropped_since_last_log: u64,
    pub(crate) last_drop_log: Option<Instant>,
}

impl QueueMetrics {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            messages_received: 0,
            messages_queued: 0,
            messages_processed: 0,
            messages_failed: 0,
            messages_dropped_total: 0,
            dropped_rate_limit: 0,
            dropped_queue_full: 0,
            dropped_size: 0,
            last_minute: RollingWindow::new(MINUTE, now),
            last_hour: RollingWindow::new(HOUR, now),
            processing_times: CircularBuffer::new(PROCESSING_TIME_SAMPLES),
            backpressure_active: false,
            last_backpressure_warning: None,
            dropped_since_last_log: 0,
            last_drop_log: None,
        }
    }

    pub(crate) fn refresh_windows(&mut self, now: Instant) {
        self.last_minute.refresh(now);
        self.last_hour.refresh(now);
    }

    pub(crate) fn record_received(&mut self) {
        self.messages_received += 1;
        self.last_minute.received += 1;
        self.last_hour.received += 1;
    }

    pub(crate) fn record_queued(&mut self) {
        self.messages_queued += 1;
    }

    pub(crate) fn record_drop(&mut self, reason: DropReason) {
        self.messages_dropped_total += 1;
        self.dropped_since_last_log += 1;
        match reason {
            DropReason::RateLimit => self.dropped_rate_limit += 1,
            DropReason::QueueFull => self.dropped_queue_full += 1,
            DropReason::Size => self.dropped_size += 1,
        }
    }

    /// One completed processing, successful or not
    ///
    /// `messages_processed` counts both outcomes, so the success count is
    /// `messages_processed - messages_failed`.
    pub(crate) fn record_completion(&mut self, elapsed_ms: f64, failed: bool) {
        self.messages_processed += 1;
        self.last_minute.processed += 1;
        self.last_hour.processed += 1;
        if failed {
            self.messages_failed += 1;
        }
        self.processing_times.add(elapsed_ms);
    }

    /// Take the batched drop count if the log interval has passed
    pub(crate) fn take_drop_log(&mut self, now: Instant, interval: Duration) -> Option<u64> {
        if self.dropped_since_last_log == 0 {
            return None;
        }

        let due = self
            .last_drop_log
            .is_none_or(|last| now.saturating_duration_since(last) >= interval);
        if !due {
            return None;
        }

        self.last_drop_log = Some(now);
        Some(std::mem::take(&mut self.dropped_since_last_log))
    }

    /// Zero cumulative counters and latency history
    ///
    /// Rolling windows, backpressure state and drop-log batching are kept.
    pub(crate) fn reset_counters(&mut self) {
        self.messages_received = 0;
        self.messages_queued = 0;
        self.messages_processed = 0;
        self.messages_failed = 0;
        self.messages_dropped_total = 0;
        self.dropped_rate_limit = 0;
        self.dropped_queue_full = 0;
        self.dropped_size = 0;
        self.processing_times.clear();
    }
}
