//! CaptureConfig - Config Loader 输出
//!
//! 描述一次采集的完整配置：设备、阈值、缓冲、时钟标定、录制与预览。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Micros, PacketKind};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub capture: CaptureSettings,

    #[serde(default)]
    pub buffers: BufferConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub recording: RecordingConfig,

    #[serde(default)]
    pub preview: PreviewConfig,
}

/// 设备配置 (真实设备只使用 name/source_id，其余字段驱动 mock 设备)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_name")]
    pub name: String,

    #[serde(default = "default_source_id")]
    pub source_id: i16,

    #[serde(default = "default_width")]
    pub width: u16,

    #[serde(default = "default_height")]
    pub height: u16,

    /// 事件包频率 (Hz)
    #[serde(default = "default_event_batch_hz")]
    pub event_batch_hz: f64,

    /// 每个事件包的事件数
    #[serde(default = "default_events_per_batch")]
    pub events_per_batch: usize,

    #[serde(default = "default_imu_rate_hz")]
    pub imu_rate_hz: f64,

    #[serde(default = "default_frame_rate_hz")]
    pub frame_rate_hz: f64,

    /// 起始本地时间戳 (微秒)，用于在接近 2^31 回绕处开始
    #[serde(default)]
    pub initial_local_ts_us: i32,
}

fn default_device_name() -> String {
    "mock-davis".to_string()
}

fn default_source_id() -> i16 {
    1
}

fn default_width() -> u16 {
    346
}

fn default_height() -> u16 {
    260
}

fn default_event_batch_hz() -> f64 {
    100.0
}

fn default_events_per_batch() -> usize {
    256
}

fn default_imu_rate_hz() -> f64 {
    200.0
}

fn default_frame_rate_hz() -> f64 {
    25.0
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            source_id: default_source_id(),
            width: default_width(),
            height: default_height(),
            event_batch_hz: default_event_batch_hz(),
            events_per_batch: default_events_per_batch(),
            imu_rate_hz: default_imu_rate_hz(),
            frame_rate_hz: default_frame_rate_hz(),
            initial_local_ts_us: 0,
        }
    }
}

/// DrainLoop 与 SynchronizationGate 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// 启动阈值：时间戳小于该值的样本被丢弃 (微秒)
    #[serde(default)]
    pub start_threshold_us: Micros,

    /// DrainLoop 节拍 (ms)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// 所有缓冲为空时的最长等待 (ms)
    #[serde(default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,

    /// 积压超过该值时跳过预览
    #[serde(default = "default_preview_backlog_threshold")]
    pub preview_backlog_threshold: usize,

    /// 无损预览：忽略积压，始终更新预览
    #[serde(default)]
    pub lossless_preview: bool,

    /// 录制失败时停止整个会话
    #[serde(default)]
    pub stop_on_record_failure: bool,
}

fn default_tick_interval_ms() -> u64 {
    30
}

fn default_idle_wait_ms() -> u64 {
    100
}

fn default_preview_backlog_threshold() -> usize {
    60
}

impl CaptureSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            start_threshold_us: Micros::ZERO,
            tick_interval_ms: default_tick_interval_ms(),
            idle_wait_ms: default_idle_wait_ms(),
            preview_backlog_threshold: default_preview_backlog_threshold(),
            lossless_preview: false,
            stop_on_record_failure: false,
        }
    }
}

/// StreamBuffer 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BufferConfig {
    /// 每个流的最大包数；None 表示不限
    #[serde(default)]
    pub capacity: Option<usize>,

    /// 满时的处理策略
    #[serde(default)]
    pub overflow_policy: DropPolicy,
}

/// 缓冲区满时的丢弃策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// 丢弃最旧的包
    #[default]
    DropOldest,
    /// 拒绝新包
    DropNewest,
}

/// 设备时钟 -> 墙钟 标定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_probes")]
    pub probes: usize,

    #[serde(default = "default_spacing_ms")]
    pub spacing_ms: u64,
}

fn default_probes() -> usize {
    10
}

fn default_spacing_ms() -> u64 {
    100
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            probes: default_probes(),
            spacing_ms: default_spacing_ms(),
        }
    }
}

/// 录制配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// 最终文件名；缺省时使用临时文件名
    #[serde(default)]
    pub file_name: Option<String>,

    /// 需要记录的流；空表示全部
    #[serde(default)]
    pub record_kinds: Vec<PacketKind>,

    /// 紧凑事件日志 (<stream>.bin)
    #[serde(default)]
    pub event_log: bool,

    /// 帧图片 (<stream>_Img/%05d.png)
    #[serde(default)]
    pub frame_images: bool,

    /// 帧文本日志 (<stream>_frames.txt)
    #[serde(default)]
    pub frame_log: bool,

    /// UTC 映射文件 (utc_<datetime>.txt)
    #[serde(default = "default_true")]
    pub utc_log: bool,
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("recordings")
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: default_output_dir(),
            file_name: None,
            record_kinds: Vec::new(),
            event_log: false,
            frame_images: false,
            frame_log: false,
            utc_log: true,
        }
    }
}

/// 预览配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// 刷新周期 (ms)
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,

    /// 稳定期内在帧上烧录时间
    #[serde(default = "default_true")]
    pub burn_in_timestamp: bool,
}

fn default_refresh_ms() -> u64 {
    40
}

impl PreviewConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
            burn_in_timestamp: true,
        }
    }
}
