//! 采集管线指标
//!
//! 指标统一使用 `dvs_capture_` 前缀。未安装 exporter 时所有调用都是空操作。

use metrics::{counter, gauge, histogram};

/// 记录一次换出
pub fn record_drain_pass(duration_ms: f64, backlog: usize, batches: usize) {
    counter!("dvs_capture_drain_ticks_total").increment(1);
    histogram!("dvs_capture_drain_pass_ms").record(duration_ms);
    gauge!("dvs_capture_backlog").set(backlog as f64);
    if batches > 0 {
        counter!("dvs_capture_batches_drained_total").increment(batches as u64);
    }
}

/// 阈值之前被闸门拒绝的样本
pub fn record_samples_rejected(stream: &str, count: u64) {
    counter!(
        "dvs_capture_samples_rejected_total",
        "stream" => stream.to_string()
    )
    .increment(count);
}

/// 积压时跳过的预览更新
pub fn record_preview_skipped(stream: &str) {
    counter!(
        "dvs_capture_preview_skipped_total",
        "stream" => stream.to_string()
    )
    .increment(1);
}

/// 录制写入失败
pub fn record_write_failure(stream: &str) {
    counter!(
        "dvs_capture_record_failures_total",
        "stream" => stream.to_string()
    )
    .increment(1);
}

/// 容器文件写入的字节数
pub fn record_recorder_bytes(bytes: usize) {
    counter!("dvs_capture_recorded_bytes_total").increment(bytes as u64);
}

/// 记录缓冲区深度
pub fn record_buffer_depth(stream: &str, depth: usize) {
    gauge!(
        "dvs_capture_buffer_depth",
        "stream" => stream.to_string()
    )
    .set(depth as f64);
}

/// 采集指标聚合器
///
/// 由周期性的状态采样驱动 (累计记录数 + 当前积压)，用于会话结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct CaptureMetricsAggregator {
    /// 采样次数
    pub samples: u64,

    /// 最近一次的累计记录数
    pub last_records: u64,

    /// 最近一次的累计丢弃数
    pub last_dropped: u64,

    /// 积压统计
    pub backlog_stats: RunningStats,

    /// 记录速率统计 (records/s)
    pub record_rate: RunningStats,
}

impl CaptureMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一次采样
    ///
    /// `interval_s` 为距上次采样的时间；首个采样只建立基线。
    pub fn observe(&mut self, interval_s: f64, records_total: u64, dropped_total: u64, backlog: usize) {
        if self.samples > 0 && interval_s > 0.0 {
            let delta = records_total.saturating_sub(self.last_records);
            self.record_rate.push(delta as f64 / interval_s);
        }
        self.samples += 1;
        self.last_records = records_total;
        self.last_dropped = dropped_total;
        self.backlog_stats.push(backlog as f64);
    }

    pub fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            samples: self.samples,
            records: self.last_records,
            dropped: self.last_dropped,
            backlog: StatsSummary::from(&self.backlog_stats),
            record_rate: StatsSummary::from(&self.record_rate),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 采集摘要
#[derive(Debug, Clone, Default)]
pub struct CaptureSummary {
    pub samples: u64,
    pub records: u64,
    pub dropped: u64,
    pub backlog: StatsSummary,
    pub record_rate: StatsSummary,
}

impl std::fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Capture Metrics Summary ===")?;
        writeln!(f, "Records submitted: {}", self.records)?;
        writeln!(f, "Batches dropped at ingestion: {}", self.dropped)?;
        writeln!(f, "Backlog (batches): {}", self.backlog)?;
        writeln!(f, "Record rate (1/s): {}", self.record_rate)?;
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
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
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
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_rates() {
        let mut aggregator = CaptureMetricsAggregator::new();

        aggregator.observe(0.0, 100, 0, 4);
        aggregator.observe(1.0, 1100, 2, 8);
        aggregator.observe(0.5, 1600, 2, 0);

        assert_eq!(aggregator.samples, 3);
        assert_eq!(aggregator.record_rate.count(), 2);
        assert!((aggregator.record_rate.mean() - 1000.0).abs() < 1e-9);
        assert!((aggregator.backlog_stats.max() - 8.0).abs() < 1e-10);

        let summary = aggregator.summary();
        assert_eq!(summary.records, 1600);
        assert_eq!(summary.dropped, 2);
    }

    #[test]
    fn test_metric_helpers_without_recorder() {
        // 未安装 exporter 时不应 panic
        record_drain_pass(1.5, 10, 3);
        record_samples_rejected("event", 5);
        record_preview_skipped("frame");
        record_write_failure("imu");
        record_recorder_bytes(128);
        record_buffer_depth("event", 2);
    }

    #[test]
    fn test_summary_display() {
        let summary = CaptureSummary {
            samples: 10,
            records: 5000,
            dropped: 3,
            backlog: StatsSummary {
                count: 10,
                min: 0.0,
                max: 12.0,
                mean: 4.0,
                std_dev: 3.0,
            },
            record_rate: StatsSummary::default(),
        };

        let output = format!("{}", summary);
        assert!(output.contains("Records submitted: 5000"));
        assert!(output.contains("Record rate (1/s): N/A"));
    }
}
