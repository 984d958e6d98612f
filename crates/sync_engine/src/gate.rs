//! SynchronizationGate - 启动阈值过滤
//!
//! 丢弃驱动稳定期 (自动曝光、初始噪声事件) 内的样本。
//! 阈值与样本时间戳均为设备微秒。

use contracts::{EventSample, FrameSample, ImuSample, Micros};

use crate::overlay;

/// 带设备时间戳的样本
pub trait Timestamped {
    fn timestamp_us(&self) -> i64;
}

impl Timestamped for EventSample {
    fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }
}

impl Timestamped for ImuSample {
    fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }
}

impl Timestamped for FrameSample {
    fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }
}

impl Timestamped for i64 {
    fn timestamp_us(&self) -> i64 {
        *self
    }
}

/// 阈值判断：严格小于阈值的样本被拒绝
#[inline]
pub fn admit<T: Timestamped + ?Sized>(sample: &T, threshold: Micros) -> bool {
    sample.timestamp_us() >= threshold.as_i64()
}

/// 同步闸门
#[derive(Debug, Clone, Copy)]
pub struct SynchronizationGate {
    threshold: Micros,
    burn_in: bool,
}

impl SynchronizationGate {
    pub fn new(threshold: Micros, burn_in: bool) -> Self {
        Self { threshold, burn_in }
    }

    /// 不过滤任何样本
    pub fn open() -> Self {
        Self::new(Micros::ZERO, false)
    }

    pub fn threshold(&self) -> Micros {
        self.threshold
    }

    #[inline]
    pub fn admit<T: Timestamped + ?Sized>(&self, sample: &T) -> bool {
        admit(sample, self.threshold)
    }

    /// 帧的判断
    ///
    /// 仍在稳定期内的帧先烧录经过的秒数再判断，
    /// 因此被拒绝的帧也可能已被修改。
    pub fn admit_frame(&self, frame: &mut FrameSample) -> bool {
        if self.burn_in && frame.timestamp_us < self.threshold.as_i64() {
            let elapsed = Micros(frame.timestamp_us).as_secs_f64();
            overlay::burn_elapsed_seconds(frame, elapsed);
        }
        self.admit(frame)
    }
}

impl Default for SynchronizationGate {
    fn default() -> Self {
        Self::open()
    }
}
