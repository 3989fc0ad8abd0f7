//! Ops hub 指标收集模块
//!
//! 通过 `metrics` facade 导出队列与分发指标；未安装 recorder 时所有调用均为 no-op。

use std::collections::HashMap;

use contracts::QueueMetricsSnapshot;
use metrics::{counter, gauge, histogram};

/// 记录一次准入决策
///
/// `outcome` 为 `accepted` 或丢弃原因 (`rate_limit` / `queue_full` / `size`)。
pub fn record_admission(queue: &str, outcome: &str) {
    counter!(
        "ops_hub_admissions_total",
        "queue" => queue.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录一次消息处理完成 (成功或失败)
pub fn record_processing(queue: &str, elapsed_ms: f64, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ops_hub_messages_processed_total",
        "queue" => queue.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("ops_hub_processing_time_ms", "queue" => queue.to_string()).record(elapsed_ms);
}

/// 记录背压状态切换
pub fn record_backpressure(queue: &str, active: bool) {
    gauge!("ops_hub_backpressure_active", "queue" => queue.to_string())
        .set(if active { 1.0 } else { 0.0 });
    if active {
        counter!("ops_hub_backpressure_events_total", "queue" => queue.to_string()).increment(1);
    }
}

/// 从周期性快照记录队列指标
///
/// 快照中的计数器是"自上次导出以来"的增量 (导出后会被清零)，
/// 因此以 counter 累加；其余为 gauge。
///
/// # Example
///
/// ```ignore
/// let snapshot = queue.get_metrics().await;
/// observability::record_queue_metrics(queue.label(), &snapshot);
/// queue.clear_metrics().await;
/// ```
pub fn record_queue_metrics(queue: &str, snapshot: &QueueMetricsSnapshot) {
    let label = queue.to_string();

    gauge!("ops_hub_queue_size", "queue" => label.clone()).set(snapshot.queue_size as f64);
    gauge!("ops_hub_queue_max_size", "queue" => label.clone()).set(snapshot.queue_max_size as f64);
    gauge!("ops_hub_queue_utilization_pct", "queue" => label.clone())
        .set(snapshot.queue_utilization_pct);
    gauge!("ops_hub_queue_pending", "queue" => label.clone()).set(snapshot.queue_pending as f64);

    counter!("ops_hub_report_received_total", "queue" => label.clone())
        .increment(snapshot.messages_received);
    counter!("ops_hub_report_failed_total", "queue" => label.clone())
        .increment(snapshot.messages_failed);

    for (reason, count) in [
        ("rate_limit", snapshot.messages_dropped_rate_limit),
        ("queue_full", snapshot.messages_dropped_queue_full),
        ("size", snapshot.messages_dropped_size),
    ] {
        if count > 0 {
            counter!(
                "ops_hub_messages_dropped_total",
                "queue" => label.clone(),
                "reason" => reason
            )
            .increment(count);
        }
    }

    gauge!("ops_hub_received_last_minute", "queue" => label.clone())
        .set(snapshot.messages_received_last_minute as f64);
    gauge!("ops_hub_processed_last_minute", "queue" => label.clone())
        .set(snapshot.messages_processed_last_minute as f64);

    gauge!("ops_hub_processing_time_avg_ms", "queue" => label.clone())
        .set(snapshot.processing_time_avg_ms);
    gauge!("ops_hub_processing_time_p95_ms", "queue" => label.clone())
        .set(snapshot.processing_time_p95_ms);
    gauge!("ops_hub_processing_time_p99_ms", "queue" => label.clone())
        .set(snapshot.processing_time_p99_ms);
    gauge!("ops_hub_processing_time_max_ms", "queue" => label.clone())
        .set(snapshot.processing_time_max_ms);

    gauge!("ops_hub_rate_limit_current", "queue" => label.clone())
        .set(snapshot.rate_limit_current as f64);
    gauge!("ops_hub_backpressure_active", "queue" => label)
        .set(f64::from(snapshot.backpressure_active));
}

/// 记录收到的 UDP 报文
pub fn record_datagram_received(bytes: usize) {
    counter!("ops_hub_datagrams_received_total").increment(1);
    histogram!("ops_hub_datagram_size_bytes").record(bytes as f64);
}

/// 记录报文解析失败
pub fn record_parse_error(reason: &str) {
    counter!("ops_hub_parse_errors_total", "reason" => reason.to_string()).increment(1);
}

/// 记录事件分发到 sink
pub fn record_event_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ops_hub_events_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 跨周期的快照聚合器
///
/// 每个导出周期的快照会被清零，聚合器把它们累加起来，
/// 用于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct QueueReportAggregator {
    /// 导出周期数
    pub reports: u64,

    pub total_received: u64,
    pub total_queued: u64,
    pub total_processed: u64,
    pub total_failed: u64,

    /// 各丢弃原因累计
    pub dropped: HashMap<&'static str, u64>,

    /// 峰值利用率 (%)
    pub peak_utilization_pct: f64,

    /// 出现背压的周期数
    pub backpressure_reports: u64,

    /// 每周期平均处理时间统计 (仅统计有处理的周期)
    pub processing_time_ms: RunningStats,

    /// 每周期 p99 统计
    pub processing_time_p99_ms: RunningStats,
}

impl QueueReportAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加一个周期快照
    pub fn update(&mut self, snapshot: &QueueMetricsSnapshot) {
        self.reports += 1;
        self.total_received += snapshot.messages_received;
        self.total_queued += snapshot.messages_queued;
        self.total_processed += snapshot.messages_processed;
        self.total_failed += snapshot.messages_failed;

        for (reason, count) in [
            ("rate_limit", snapshot.messages_dropped_rate_limit),
            ("queue_full", snapshot.messages_dropped_queue_full),
            ("size", snapshot.messages_dropped_size),
        ] {
            *self.dropped.entry(reason).or_insert(0) += count;
        }

        self.peak_utilization_pct = self.peak_utilization_pct.max(snapshot.queue_utilization_pct);
        if snapshot.backpressure_active != 0 {
            self.backpressure_reports += 1;
        }

        if snapshot.messages_processed > 0 {
            self.processing_time_ms.push(snapshot.processing_time_avg_ms);
            self.processing_time_p99_ms.push(snapshot.processing_time_p99_ms);
        }
    }

    /// 累计丢弃数
    pub fn total_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }

    /// 生成摘要报告
    pub fn summary(&self) -> ReportSummary {
        let total_dropped = self.total_dropped();
        ReportSummary {
            reports: self.reports,
            total_received: self.total_received,
            total_processed: self.total_processed,
            total_failed: self.total_failed,
            total_dropped,
            drop_rate: percent(total_dropped, self.total_received),
            failure_rate: percent(self.total_failed, self.total_processed),
            peak_utilization_pct: self.peak_utilization_pct,
            backpressure_reports: self.backpressure_reports,
            processing_time_ms: StatsSummary::from(&self.processing_time_ms),
            processing_time_p99_ms: StatsSummary::from(&self.processing_time_p99_ms),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct ReportSummary {
    pub reports: u64,
    pub total_received: u64,
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_dropped: u64,
    pub drop_rate: f64,
    pub failure_rate: f64,
    pub peak_utilization_pct: f64,
    pub backpressure_reports: u64,
    pub processing_time_ms: StatsSummary,
    pub processing_time_p99_ms: StatsSummary,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Queue Summary ({} reports) ===", self.reports)?;
        writeln!(f, "Received: {}", self.total_received)?;
        writeln!(
            f,
            "Processed: {} (failed {}, {:.2}%)",
            self.total_processed, self.total_failed, self.failure_rate
        )?;
        writeln!(
            f,
            "Dropped: {} ({:.2}%)",
            self.total_dropped, self.drop_rate
        )?;
        writeln!(f, "Peak utilization: {:.1}%", self.peak_utilization_pct)?;
        writeln!(f, "Reports under backpressure: {}", self.backpressure_reports)?;
        writeln!(f, "Processing time avg (ms): {}", self.processing_time_ms)?;
        writeln!(f, "Processing time p99 (ms): {}", self.processing_time_p99_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
