//! 设备时钟 -> 墙钟 标定
//!
//! 多次同时读取设备时钟与墙钟，取差值均值作为加性偏移，
//! 把设备相对微秒映射为当日墙钟毫秒。不校正长时间漂移。

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use observability::RunningStats;
use tracing::{debug, info};

use crate::error::CalibrationError;

/// 一天的毫秒数
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// 当日墙钟毫秒
pub fn ms_of_day(time: &DateTime<Utc>) -> f64 {
    f64::from(time.num_seconds_from_midnight()) * 1000.0
        + f64::from(time.nanosecond() % 1_000_000_000) / 1_000_000.0
}

/// 一次同时读数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockProbe {
    /// 设备相对时间 (微秒)
    pub device_us: i64,
    /// 墙钟，当日毫秒
    pub wall_ms_of_day: f64,
}

impl ClockProbe {
    pub fn new(device_us: i64, wall_ms_of_day: f64) -> Self {
        Self {
            device_us,
            wall_ms_of_day,
        }
    }

    pub fn at(device_us: i64, wall: &DateTime<Utc>) -> Self {
        Self::new(device_us, ms_of_day(wall))
    }

    fn offset_ms(&self) -> f64 {
        self.wall_ms_of_day - self.device_us as f64 / 1000.0
    }
}

/// 标定结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockCalibration {
    /// 加性偏移 (ms)，已归一到 [0, MS_PER_DAY)
    offset_ms: f64,
    probe_count: usize,
    /// 各次读数偏移的标准差 (ms)
    jitter_ms: f64,
}

impl ClockCalibration {
    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count
    }

    pub fn jitter_ms(&self) -> f64 {
        self.jitter_ms
    }

    /// 设备时间 -> 当日墙钟毫秒
    pub fn to_wall_ms_of_day(&self, device_us: i64) -> f64 {
        (device_us as f64 / 1000.0 + self.offset_ms).rem_euclid(MS_PER_DAY)
    }
}

/// 由读数计算偏移
///
/// 跨午夜的读数会先展开到同一天再取均值。
pub fn calibrate_wall_clock(probes: &[ClockProbe]) -> Result<ClockCalibration, CalibrationError> {
    let Some(first) = probes.first() else {
        return Err(CalibrationError::NotEnoughProbes { got: 0 });
    };
    if probes
        .iter()
        .any(|p| !p.wall_ms_of_day.is_finite() || !(0.0..MS_PER_DAY).contains(&p.wall_ms_of_day))
    {
        return Err(CalibrationError::InvalidProbe);
    }

    let reference = first.offset_ms();
    let mut stats = RunningStats::default();
    for probe in probes {
        let mut offset = probe.offset_ms();
        let delta = offset - reference;
        if delta > MS_PER_DAY / 2.0 {
            offset -= MS_PER_DAY;
        } else if delta < -MS_PER_DAY / 2.0 {
            offset += MS_PER_DAY;
        }
        stats.push(offset);
    }

    let calibration = ClockCalibration {
        offset_ms: stats.mean().rem_euclid(MS_PER_DAY),
        probe_count: probes.len(),
        jitter_ms: stats.std_dev(),
    };
    debug!(
        offset_ms = calibration.offset_ms,
        jitter_ms = calibration.jitter_ms,
        probes = calibration.probe_count,
        "clock calibration computed"
    );
    Ok(calibration)
}

/// 采集读数：每次读取设备时钟与墙钟，间隔 `spacing`
pub fn collect_probes(
    device_clock: impl Fn() -> i64,
    count: usize,
    spacing: Duration,
) -> Vec<ClockProbe> {
    let mut probes = Vec::with_capacity(count);
    for i in 0..count {
        let device_us = device_clock();
        let wall = Utc::now();
        probes.push(ClockProbe::at(device_us, &wall));
        if i + 1 < count {
            thread::sleep(spacing);
        }
    }
    probes
}

/// 采集并计算
pub fn calibrate_live(
    device_clock: impl Fn() -> i64,
    count: usize,
    spacing: Duration,
) -> Result<ClockCalibration, CalibrationError> {
    if count < 2 {
        return Err(CalibrationError::NotEnoughProbes { got: count });
    }
    let probes = collect_probes(device_clock, count, spacing);
    let calibration = calibrate_wall_clock(&probes)?;
    info!(
        offset_ms = calibration.offset_ms(),
        jitter_ms = calibration.jitter_ms(),
        "device clock calibrated against wall clock"
    );
    Ok(calibration)
}
