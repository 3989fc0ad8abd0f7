//! Pipeline statistics.

use std::time::Duration;

use dispatcher::SinkMetricsSnapshot;
use observability::ReportSummary;

use super::listener::ListenerStats;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Datagrams read from the socket
    pub datagrams_received: u64,

    /// Events admitted to the queue
    pub admitted: u64,

    pub dropped_size: u64,
    pub dropped_rate_limit: u64,
    pub dropped_queue_full: u64,

    /// Datagrams that were not valid task events
    pub parse_errors: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of configured sinks
    pub active_sinks: usize,

    /// Aggregated periodic reports (None when reporting is disabled)
    pub queue_summary: Option<ReportSummary>,

    /// Final per-sink counters
    pub sink_metrics: Vec<(String, SinkMetricsSnapshot)>,
}

impl PipelineStats {
    pub fn apply_listener(&mut self, listener: &ListenerStats) {
        self.datagrams_received = listener.received;
        self.admitted = listener.admitted;
        self.dropped_size = listener.dropped_size;
        self.dropped_rate_limit = listener.dropped_rate_limit;
        self.dropped_queue_full = listener.dropped_queue_full;
        self.parse_errors = listener.parse_errors;
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_size + self.dropped_rate_limit + self.dropped_queue_full
    }

    /// Datagrams per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.datagrams_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Datagrams received: {}", self.datagrams_received);
        println!("   ├─ Throughput: {:.2}/s", self.throughput());
        println!("   ├─ Admitted: {}", self.admitted);
        println!("   ├─ Parse errors: {}", self.parse_errors);
        println!("   └─ Active sinks: {}", self.active_sinks);

        println!("\n🚦 Admission Drops");
        println!("   ├─ Total: {}", self.dropped());
        println!("   ├─ Size: {}", self.dropped_size);
        println!("   ├─ Rate limit: {}", self.dropped_rate_limit);
        println!("   └─ Queue full: {}", self.dropped_queue_full);

        if let Some(ref summary) = self.queue_summary {
            println!("\n📈 Queue Reports");
            for line in summary.to_string().lines() {
                println!("   {}", line);
            }
        }

        if !self.sink_metrics.is_empty() {
            println!("\n📤 Sinks");
            for (i, (name, m)) in self.sink_metrics.iter().enumerate() {
                let prefix = if i == self.sink_metrics.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                println!(
                    "   {} {}: written={} failed={} dropped={} skipped={}",
                    prefix, name, m.write_count, m.failure_count, m.dropped_count, m.skipped_count
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_listener_and_dropped() {
        let listener = ListenerStats {
            received: 10,
            admitted: 5,
            dropped_size: 1,
            dropped_rate_limit: 2,
            dropped_queue_full: 1,
            parse_errors: 1,
        };

        let mut stats = PipelineStats {
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        stats.apply_listener(&listener);

        assert_eq!(stats.dropped(), 4);
        assert_eq!(stats.admitted + stats.dropped() + stats.parse_errors, 10);
        assert!((stats.throughput() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_zero_duration() {
        assert_eq!(PipelineStats::default().throughput(), 0.0);
    }
}
