//! Fixed-window rate limiter
//!
//! Counts admissions inside a 60 s window that is reset lazily, on the first
//! check after it has elapsed. A burst of up to twice the limit is possible
//! across a window boundary.

use std::time::Duration;

use tokio::time::Instant;

/// Window length
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Fixed-window admission counter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_per_minute: u32,
    message_count: u32,
    window_start: Instant,
}

impl RateLimiter {
    /// Create a limiter allowing `max_per_minute` admissions per window
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            message_count: 0,
            window_start: Instant::now(),
        }
    }

    /// Try to take one admission from the current window
    pub fn check_limit(&mut self) -> bool {
        self.check_limit_at(Instant::now())
    }

    pub fn check_limit_at(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) >= RATE_LIMIT_WINDOW {
            self.message_count = 0;
            self.window_start = now;
        }

        if self.message_count < self.max_per_minute {
            self.message_count += 1;
            true
        } else {
            false
        }
    }

    /// Current rate extrapolated to messages per minute
    pub fn current_rate(&self) -> u64 {
        self.current_rate_at(Instant::now())
    }

    pub fn current_rate_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= RATE_LIMIT_WINDOW {
            return 0;
        }

        let elapsed_secs = elapsed.as_secs_f64();
        if elapsed_secs == 0.0 {
            return u64::from(self.message_count);
        }

        ((f64::from(self.message_count) / elapsed_secs) * 60.0).round() as u64
    }

    /// Configured limit
    pub fn max_per_minute(&self) -> u32 {
        self.max_per_minute
    }

    /// Admissions counted in the current window
    pub fn message_count(&self) -> u32 {
        self.message_count
    }
}
