//! PacketBatch - PacketSource 输出
//!
//! 驱动交付的原始数据包。包内时间戳是 32 位本地值，
//! 同一个包共享一个 overflow epoch。

use serde::{Deserialize, Serialize};

/// 数据包类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    Event,
    Imu,
    Frame,
    Special,
}

impl PacketKind {
    /// 可记录的流类型 (按 DrainLoop 优先级排列)
    pub const STREAMS: [PacketKind; 3] = [PacketKind::Event, PacketKind::Imu, PacketKind::Frame];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PacketKind::Event => "event",
            PacketKind::Imu => "imu",
            PacketKind::Frame => "frame",
            PacketKind::Special => "special",
        }
    }

    /// 容器文件中的类型标签
    pub const fn tag(self) -> u8 {
        match self {
            PacketKind::Event => 1,
            PacketKind::Imu => 2,
            PacketKind::Frame => 3,
            PacketKind::Special => 4,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(PacketKind::Event),
            2 => Some(PacketKind::Imu),
            3 => Some(PacketKind::Frame),
            4 => Some(PacketKind::Special),
            _ => None,
        }
    }
}

impl std::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 原始极性事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub timestamp: i32,
    pub x: u16,
    pub y: u16,
    pub polarity: bool,
}

/// 原始 IMU 样本 (g, deg/s, °C)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawImu {
    pub timestamp: i32,
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub temperature: f32,
}

/// 曝光窗口 (本地时间戳)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureWindow {
    pub start: i32,
    pub end: i32,
}

impl ExposureWindow {
    pub fn duration_us(&self) -> i64 {
        i64::from(self.end) - i64::from(self.start)
    }
}

/// 原始强度帧
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub ts_start_frame: i32,
    pub ts_end_frame: i32,
    /// 并非所有驱动都上报曝光元数据
    pub exposure: Option<ExposureWindow>,
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u16>,
}

impl RawFrame {
    /// 检查尺寸与像素数是否一致；空帧视为合法 (由 DrainLoop 跳过)
    pub fn check_layout(&self) -> Result<(), String> {
        if self.width < 0 || self.height < 0 {
            return Err(format!(
                "negative frame size {}x{}",
                self.width, self.height
            ));
        }
        let expected = self.width as usize * self.height as usize;
        if !self.pixels.is_empty() && self.pixels.len() != expected {
            return Err(format!(
                "pixel count {} does not match {}x{}",
                self.pixels.len(),
                self.width,
                self.height
            ));
        }
        Ok(())
    }
}

/// 特殊事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKind {
    TimestampWrap,
    TimestampReset,
    ExternalInputRising,
    ExternalInputFalling,
    ExternalInputPulse,
    TooManyEvents,
    DataDropped,
    Other(u8),
}

impl SpecialKind {
    /// 驱动侧类型编码
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => SpecialKind::TimestampWrap,
            1 => SpecialKind::TimestampReset,
            2 => SpecialKind::ExternalInputRising,
            3 => SpecialKind::ExternalInputFalling,
            4 => SpecialKind::ExternalInputPulse,
            18 => SpecialKind::TooManyEvents,
            50 => SpecialKind::DataDropped,
            other => SpecialKind::Other(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SpecialKind::TimestampWrap => 0,
            SpecialKind::TimestampReset => 1,
            SpecialKind::ExternalInputRising => 2,
            SpecialKind::ExternalInputFalling => 3,
            SpecialKind::ExternalInputPulse => 4,
            SpecialKind::TooManyEvents => 18,
            SpecialKind::DataDropped => 50,
            SpecialKind::Other(code) => code,
        }
    }
}

/// 原始特殊事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSpecial {
    pub timestamp: i32,
    pub kind: SpecialKind,
    /// 附加数据 (例如丢弃的事件数)
    pub data: u32,
}

/// 数据包载荷，每个包只含一种样本
#[derive(Debug, Clone, PartialEq)]
pub enum BatchPayload {
    Events(Vec<RawEvent>),
    Imu(Vec<RawImu>),
    Frames(Vec<RawFrame>),
    Special(Vec<RawSpecial>),
}

/// 驱动数据包
#[derive(Debug, Clone, PartialEq)]
pub struct PacketBatch {
    /// 设备源 ID
    pub source_id: i16,
    /// 本地 32 位时间戳的溢出计数，对包内所有样本一致
    pub overflow_counter: i32,
    pub payload: BatchPayload,
}

impl PacketBatch {
    pub fn events(source_id: i16, overflow_counter: i32, events: Vec<RawEvent>) -> Self {
        Self {
            source_id,
            overflow_counter,
            payload: BatchPayload::Events(events),
        }
    }

    pub fn imu(source_id: i16, overflow_counter: i32, samples: Vec<RawImu>) -> Self {
        Self {
            source_id,
            overflow_counter,
            payload: BatchPayload::Imu(samples),
        }
    }

    pub fn frames(source_id: i16, overflow_counter: i32, frames: Vec<RawFrame>) -> Self {
        Self {
            source_id,
            overflow_counter,
            payload: BatchPayload::Frames(frames),
        }
    }

    pub fn special(source_id: i16, overflow_counter: i32, specials: Vec<RawSpecial>) -> Self {
        Self {
            source_id,
            overflow_counter,
            payload: BatchPayload::Special(specials),
        }
    }

    pub fn kind(&self) -> PacketKind {
        match &self.payload {
            BatchPayload::Events(_) => PacketKind::Event,
            BatchPayload::Imu(_) => PacketKind::Imu,
            BatchPayload::Frames(_) => PacketKind::Frame,
            BatchPayload::Special(_) => PacketKind::Special,
        }
    }

    /// 样本数
    pub fn len(&self) -> usize {
        match &self.payload {
            BatchPayload::Events(v) => v.len(),
            BatchPayload::Imu(v) => v.len(),
            BatchPayload::Frames(v) => v.len(),
            BatchPayload::Special(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 容器级回调交付的一组数据包
///
/// 通过 `Arc` 共享，直到 DrainLoop 处理完最后一个引用才释放。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketContainer {
    pub batches: Vec<PacketBatch>,
}

impl PacketContainer {
    pub fn new(batches: Vec<PacketBatch>) -> Self {
        Self { batches }
    }
}
