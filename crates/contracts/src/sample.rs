//! 重建后的样本类型 - SynchronizationGate / Recorder / Preview 的输入
//!
//! 时间戳均为 64 位设备相对微秒 (见 `Micros`)。

use serde::{Deserialize, Serialize};

/// 重力加速度 (g -> m/s^2)
pub const STANDARD_GRAVITY: f32 = 9.81;

/// 亮度变化事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSample {
    pub timestamp_us: i64,
    pub x: u16,
    pub y: u16,
    /// true = 变亮 (ON)
    pub polarity: bool,
}

/// 惯性测量样本
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    pub timestamp_us: i64,
    /// 加速度 (g)
    pub accel: [f32; 3],
    /// 角速度 (deg/s)
    pub gyro: [f32; 3],
    /// 温度 (°C)
    pub temperature: f32,
}

impl ImuSample {
    /// 加速度 (m/s^2)
    pub fn accel_si(&self) -> [f32; 3] {
        self.accel.map(|a| a * STANDARD_GRAVITY)
    }

    /// 角速度 (rad/s)
    pub fn gyro_si(&self) -> [f32; 3] {
        self.gyro.map(f32::to_radians)
    }
}

/// 强度帧 (16 位像素, 行优先)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    /// 帧开始时间
    pub timestamp_us: i64,
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u16>,
    /// 曝光时长；驱动未提供曝光元数据时为 None
    pub exposure_us: Option<i64>,
}

impl FrameSample {
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty() || self.width <= 0 || self.height <= 0
    }

    pub fn exposure_ms(&self) -> Option<f32> {
        self.exposure_us.map(|us| us as f32 / 1000.0)
    }

    /// 像素下标；坐标越界返回 None
    pub fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imu_si_units() {
        let imu = ImuSample {
            timestamp_us: 0,
            accel: [0.0, 0.0, 1.0],
            gyro: [180.0, 0.0, 0.0],
            temperature: 30.0,
        };
        assert!((imu.accel_si()[2] - 9.81).abs() < 1e-6);
        assert!((imu.gyro_si()[0] - std::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn test_frame_index_bounds() {
        let frame = FrameSample {
            timestamp_us: 0,
            width: 4,
            height: 2,
            pixels: vec![0; 8],
            exposure_us: None,
        };
        assert_eq!(frame.index_of(3, 1), Some(7));
        assert_eq!(frame.index_of(4, 0), None);
        assert_eq!(frame.index_of(-1, 0), None);
        assert!(frame.exposure_ms().is_none());
    }
}
