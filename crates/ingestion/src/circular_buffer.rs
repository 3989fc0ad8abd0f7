//! Fixed-capacity sample buffer for processing latencies.
//!
//! Backed by a `HeapRb`; once full, each new sample evicts the oldest one.
//! No locking of its own, the owner serializes access.

use std::fmt;

use ringbuf::{traits::*, HeapRb};

/// Ring buffer of `f64` samples with summary statistics
pub struct CircularBuffer {
    ring: HeapRb<f64>,
    capacity: usize,
}

impl fmt::Debug for CircularBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularBuffer")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl CircularBuffer {
    /// Create a buffer holding at most `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
        }
    }

    /// Add a sample, overwriting the oldest one when full
    #[inline]
    pub fn add(&mut self, value: f64) {
        if self.ring.is_full() {
            let _ = self.ring.try_pop();
        }
        let _ = self.ring.try_push(value);
    }

    /// Samples in insertion order, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.ring.iter().copied().collect()
    }

    /// Number of stored samples
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Arithmetic mean
    pub fn average(&self) -> Option<f64> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let sum: f64 = self.ring.iter().sum();
        Some(sum / len as f64)
    }

    /// Largest sample
    pub fn max(&self) -> Option<f64> {
        self.ring.iter().copied().reduce(f64::max)
    }

    /// Nearest-rank percentile, `p` in `(0, 1]`
    ///
    /// Sorts a copy and picks index `ceil(n * p) - 1`.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let mut sorted = self.values();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let rank = (sorted.len() as f64 * p).ceil() as usize;
        let index = rank.saturating_sub(1).min(sorted.len() - 1);
        Some(sorted[index])
    }

    pub fn percentile_95(&self) -> Option<f64> {
        self.percentile(0.95)
    }

    pub fn percentile_99(&self) -> Option<f64> {
        self.percentile(0.99)
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        while self.ring.try_pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrites_oldest() {
        let mut buffer = CircularBuffer::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            buffer.add(v);
        }

        assert_eq!(buffer.values(), vec![2.0, 3.0, 4.0]);
        assert_eq!(buffer.max(), Some(4.0));
        assert_eq!(buffer.average(), Some(3.0));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_insertion_order_after_wraparound() {
        let mut buffer = CircularBuffer::new(4);
        for v in 1..=10 {
            buffer.add(v as f64);
        }
        assert_eq!(buffer.values(), vec![7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_empty_getters() {
        let buffer = CircularBuffer::new(10);
        assert!(buffer.is_empty());
        assert!(buffer.values().is_empty());
        assert_eq!(buffer.average(), None);
        assert_eq!(buffer.max(), None);
        assert_eq!(buffer.percentile_95(), None);
        assert_eq!(buffer.percentile_99(), None);
    }

    #[test]
    fn test_nearest_rank_percentiles() {
        let mut buffer = CircularBuffer::new(1000);
        // Insert out of order; percentile must sort a copy
        for v in (1..=100).rev() {
            buffer.add(v as f64);
        }

        assert_eq!(buffer.percentile_95(), Some(95.0));
        assert_eq!(buffer.percentile_99(), Some(99.0));
        assert_eq!(buffer.values()[0], 100.0);
    }

    #[test]
    fn test_percentile_small_sample() {
        let mut buffer = CircularBuffer::new(10);
        buffer.add(5.0);
        buffer.add(1.0);
        buffer.add(3.0);
        // ceil(3 * 0.95) - 1 = 2
        assert_eq!(buffer.percentile_95(), Some(5.0));
        assert_eq!(buffer.percentile(0.5), Some(3.0));
    }

    #[test]
    fn test_clear() {
        let mut buffer = CircularBuffer::new(3);
        buffer.add(1.0);
        buffer.add(2.0);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 3);

        buffer.add(7.0);
        assert_eq!(buffer.values(), vec![7.0]);
    }
}
