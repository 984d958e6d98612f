//! Micros - 设备时间单位
//!
//! 所有重建后的时间戳与启动阈值都以微秒表示，避免秒/微秒混用。

use serde::{Deserialize, Serialize};

/// 微秒时间量 (设备相对时钟)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Micros(pub i64);

impl Micros {
    pub const ZERO: Micros = Micros(0);

    /// 从秒构造 (四舍五入到微秒)
    pub fn from_secs_f64(secs: f64) -> Self {
        Micros((secs * 1_000_000.0).round() as i64)
    }

    pub const fn from_millis(ms: i64) -> Self {
        Micros(ms * 1_000)
    }

    pub const fn as_i64(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }
}

impl From<i64> for Micros {
    fn from(value: i64) -> Self {
        Micros(value)
    }
}

impl std::fmt::Display for Micros {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}us", self.0)
    }
}
