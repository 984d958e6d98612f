//! DrainLoop 运行统计
//!
//! 原子计数，DrainLoop 线程写，会话持有者与 UI 线程读。

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

/// DrainLoop 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Idle,
    Running,
    Stopping,
}

/// 原子状态单元
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn get(&self) -> DrainState {
        match self.0.load(Ordering::Acquire) {
            1 => DrainState::Running,
            2 => DrainState::Stopping,
            _ => DrainState::Idle,
        }
    }

    pub fn set(&self, state: DrainState) {
        let raw = match state {
            DrainState::Idle => 0,
            DrainState::Running => 1,
            DrainState::Stopping => 2,
        };
        self.0.store(raw, Ordering::Release);
    }
}

/// DrainLoop 统计
#[derive(Debug, Default)]
pub struct DrainStats {
    ticks: AtomicU64,
    batches_drained: AtomicU64,
    records_submitted: AtomicU64,
    record_failures: AtomicU64,
    recordings_aborted: AtomicU64,
    samples_rejected: AtomicU64,
    samples_invalid: AtomicU64,
    preview_updates: AtomicU64,
    preview_skipped: AtomicU64,
    empty_frames: AtomicU64,
    timestamp_regressions: AtomicU64,
    timestamp_resets: AtomicU64,
    data_dropped_markers: AtomicU64,
    max_backlog: AtomicUsize,
    last_backlog: AtomicUsize,
}

macro_rules! counter_methods {
    ($($field:ident => $inc:ident),* $(,)?) => {
        $(
            pub fn $inc(&self, n: u64) {
                self.$field.fetch_add(n, Ordering::Relaxed);
            }
        )*
    };
}

impl DrainStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter_methods! {
        ticks => add_ticks,
        batches_drained => add_batches,
        records_submitted => add_records,
        record_failures => add_record_failures,
        recordings_aborted => add_recordings_aborted,
        samples_rejected => add_rejected,
        samples_invalid => add_invalid,
        preview_updates => add_preview_updates,
        preview_skipped => add_preview_skipped,
        empty_frames => add_empty_frames,
        timestamp_regressions => add_regressions,
        timestamp_resets => add_resets,
        data_dropped_markers => add_data_dropped,
    }

    /// 记录一次节拍开始时的积压
    pub fn observe_backlog(&self, backlog: usize) {
        self.last_backlog.store(backlog, Ordering::Relaxed);
        self.max_backlog.fetch_max(backlog, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DrainSnapshot {
        DrainSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            batches_drained: self.batches_drained.load(Ordering::Relaxed),
            records_submitted: self.records_submitted.load(Ordering::Relaxed),
            record_failures: self.record_failures.load(Ordering::Relaxed),
            recordings_aborted: self.recordings_aborted.load(Ordering::Relaxed),
            samples_rejected: self.samples_rejected.load(Ordering::Relaxed),
            samples_invalid: self.samples_invalid.load(Ordering::Relaxed),
            preview_updates: self.preview_updates.load(Ordering::Relaxed),
            preview_skipped: self.preview_skipped.load(Ordering::Relaxed),
            empty_frames: self.empty_frames.load(Ordering::Relaxed),
            timestamp_regressions: self.timestamp_regressions.load(Ordering::Relaxed),
            timestamp_resets: self.timestamp_resets.load(Ordering::Relaxed),
            data_dropped_markers: self.data_dropped_markers.load(Ordering::Relaxed),
            max_backlog: self.max_backlog.load(Ordering::Relaxed),
            last_backlog: self.last_backlog.load(Ordering::Relaxed),
        }
    }
}

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSnapshot {
    pub ticks: u64,
    pub batches_drained: u64,
    /// 交给 Recorder 的记录数 (含失败)
    pub records_submitted: u64,
    pub record_failures: u64,
    /// 因写入失败被停止的录制
    pub recordings_aborted: u64,
    /// 阈值之前被丢弃的样本
    pub samples_rejected: u64,
    /// 时间戳无效 (负值) 的样本
    pub samples_invalid: u64,
    pub preview_updates: u64,
    pub preview_skipped: u64,
    pub empty_frames: u64,
    pub timestamp_regressions: u64,
    pub timestamp_resets: u64,
    pub data_dropped_markers: u64,
    pub max_backlog: usize,
    pub last_backlog: usize,
}
