//! 时间戳重建
//!
//! 驱动时间戳 = 31 位本地值 + 每包溢出计数：
//! `ts = (overflow << 31) | local`。

use crate::calibration::ClockCalibration;

/// 溢出计数左移位数
pub const OVERFLOW_SHIFT: u32 = 31;

/// 重建 64 位设备时间戳 (微秒)
///
/// 纯函数。本地时间戳为负时结果为负，由调用方丢弃。
#[inline]
pub fn reconstruct(local_ts: i32, overflow: i32) -> i64 {
    (i64::from(overflow) << OVERFLOW_SHIFT) | i64::from(local_ts)
}

/// 时间戳重建器
///
/// 重建本身无状态；额外携带可选的墙钟标定。
#[derive(Debug, Clone, Default)]
pub struct TimestampReconstructor {
    calibration: Option<ClockCalibration>,
}

impl TimestampReconstructor {
    pub fn new(calibration: Option<ClockCalibration>) -> Self {
        Self { calibration }
    }

    #[inline]
    pub fn reconstruct(local_ts: i32, overflow: i32) -> i64 {
        reconstruct(local_ts, overflow)
    }

    pub fn calibration(&self) -> Option<&ClockCalibration> {
        self.calibration.as_ref()
    }

    pub fn set_calibration(&mut self, calibration: Option<ClockCalibration>) {
        self.calibration = calibration;
    }

    /// 设备时间 -> 当日墙钟毫秒；未标定返回 None
    pub fn wall_clock_ms(&self, device_us: i64) -> Option<u32> {
        self.calibration
            .as_ref()
            .map(|c| c.to_wall_ms_of_day(device_us).round() as u32 % 86_400_000)
    }
}

/// 单调性检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonicity {
    First,
    Monotonic,
    Regressed { previous: i64 },
}

/// 每个流的单调性跟踪
///
/// 驱动的时间戳复位事件会调用 `reset`，复位后的回退不计为异常。
#[derive(Debug, Clone, Default)]
pub struct EpochTracker {
    last: Option<i64>,
    regressions: u64,
}

impl EpochTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, timestamp_us: i64) -> Monotonicity {
        let result = match self.last {
            None => Monotonicity::First,
            Some(previous) if timestamp_us < previous => {
                self.regressions += 1;
                Monotonicity::Regressed { previous }
            }
            Some(_) => Monotonicity::Monotonic,
        };
        // 回退后以新值为基准，避免一次回退连带后续全部报警
        self.last = Some(timestamp_us);
        result
    }

    /// 检查一个包的首尾时间戳
    pub fn observe_batch(&mut self, first_us: i64, last_us: i64) -> Monotonicity {
        let result = self.observe(first_us);
        if last_us > first_us {
            self.last = Some(last_us);
        }
        result
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<i64> {
        self.last
    }

    pub fn regressions(&self) -> u64 {
        self.regressions
    }
}
