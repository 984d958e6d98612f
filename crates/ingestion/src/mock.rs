//! Mock 数据源
//!
//! 实现 `PacketSource`，在后台线程按配置频率生成事件、IMU 与帧数据包，
//! 用于无硬件环境的测试与演示。时间戳按真实驱动的方式拆分为
//! 31 位本地值 + 溢出计数。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{
    ContractError, DeviceConfig, ExposureWindow, PacketBatch, PacketContainer, PacketHandler,
    PacketKind, PacketSource, RawEvent, RawFrame, RawImu, RawSpecial, SpecialKind,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

/// 本地时间戳位宽
const LOCAL_TS_MASK: i64 = 0x7FFF_FFFF;

/// 把 64 位设备时间拆成 (本地时间戳, 溢出计数)
pub fn split_device_time(device_us: i64) -> (i32, i32) {
    ((device_us & LOCAL_TS_MASK) as i32, (device_us >> 31) as i32)
}

/// Mock 数据源配置
#[derive(Debug, Clone)]
pub struct MockSourceConfig {
    pub name: String,
    pub source_id: i16,
    pub width: u16,
    pub height: u16,
    /// 事件包频率 (Hz)，0 表示关闭
    pub event_batch_hz: f64,
    pub events_per_batch: usize,
    /// 0 表示关闭
    pub imu_rate_hz: f64,
    /// 0 表示关闭
    pub frame_rate_hz: f64,
    /// 设备时钟起点 (微秒)
    pub initial_local_ts_us: i32,
    /// 通过容器回调交付
    pub container_delivery: bool,
    /// 模拟设备不可用
    pub fail_on_start: bool,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self::from(&DeviceConfig::default())
    }
}

impl From<&DeviceConfig> for MockSourceConfig {
    fn from(device: &DeviceConfig) -> Self {
        Self {
            name: device.name.clone(),
            source_id: device.source_id,
            width: device.width,
            height: device.height,
            event_batch_hz: device.event_batch_hz,
            events_per_batch: device.events_per_batch,
            imu_rate_hz: device.imu_rate_hz,
            frame_rate_hz: device.frame_rate_hz,
            initial_local_ts_us: device.initial_local_ts_us,
            container_delivery: false,
            fail_on_start: false,
        }
    }
}

/// 设备时钟
#[derive(Debug, Clone, Copy)]
struct DeviceClock {
    epoch: Instant,
    offset_us: i64,
}

impl DeviceClock {
    fn now_us(&self) -> i64 {
        self.offset_us + self.epoch.elapsed().as_micros() as i64
    }
}

type SharedHandler = Arc<RwLock<Option<Arc<dyn PacketHandler>>>>;

/// 投递数据包到当前注册的处理器
#[derive(Clone)]
struct Delivery {
    handler: SharedHandler,
    container: bool,
}

impl Delivery {
    fn deliver(&self, batch: PacketBatch) {
        let Some(handler) = self.handler.read().clone() else {
            return;
        };
        if self.container {
            handler.on_container(Arc::new(PacketContainer::new(vec![batch])));
            return;
        }
        match batch.kind() {
            PacketKind::Event | PacketKind::Special => handler.on_event_batch(&batch),
            PacketKind::Imu => handler.on_imu_batch(&batch),
            PacketKind::Frame => handler.on_frame_batch(&batch),
        }
    }
}

/// xorshift64，用于生成事件坐标
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

/// Mock 数据源
pub struct MockPacketSource {
    config: MockSourceConfig,
    clock: DeviceClock,
    handler: SharedHandler,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl MockPacketSource {
    /// 创建新的 Mock 数据源
    pub fn new(config: MockSourceConfig) -> Self {
        let clock = DeviceClock {
            epoch: Instant::now(),
            offset_us: i64::from(config.initial_local_ts_us),
        };
        Self {
            config,
            clock,
            handler: Arc::new(RwLock::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// 从设备配置创建
    pub fn from_device_config(device: &DeviceConfig) -> Self {
        Self::new(MockSourceConfig::from(device))
    }

    pub fn config(&self) -> &MockSourceConfig {
        &self.config
    }

    fn delivery(&self) -> Delivery {
        Delivery {
            handler: self.handler.clone(),
            container: self.config.container_delivery,
        }
    }

    fn spawn_stream(
        &self,
        kind: PacketKind,
        rate_hz: f64,
        mut step: impl FnMut(i64, &Delivery) + Send + 'static,
    ) -> Result<JoinHandle<()>, ContractError> {
        let interval = Duration::from_secs_f64(1.0 / rate_hz);
        let running = self.running.clone();
        let clock = self.clock;
        let delivery = self.delivery();
        let name = self.config.name.clone();

        thread::Builder::new()
            .name(format!("mock-{kind}"))
            .spawn(move || {
                debug!(device = %name, stream = %kind, rate_hz, "mock stream started");
                while running.load(Ordering::Relaxed) {
                    step(clock.now_us(), &delivery);
                    thread::sleep(interval);
                }
                debug!(device = %name, stream = %kind, "mock stream stopped");
            })
            .map_err(ContractError::from)
    }

    fn event_step(
        config: &MockSourceConfig,
        interval_us: i64,
    ) -> impl FnMut(i64, &Delivery) + Send + 'static {
        let source_id = config.source_id;
        let count = config.events_per_batch.max(1);
        let (width, height) = (u64::from(config.width), u64::from(config.height));
        let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
        let mut last_overflow: Option<i32> = None;

        move |now_us, delivery| {
            let (_, overflow) = split_device_time(now_us);
            // 一个包只能属于一个 epoch
            let epoch_start = i64::from(overflow) << 31;
            let start_us = (now_us - interval_us).max(epoch_start).max(0);

            if let Some(previous) = last_overflow {
                if previous != overflow {
                    delivery.deliver(PacketBatch::special(
                        source_id,
                        overflow,
                        vec![RawSpecial {
                            timestamp: 0,
                            kind: SpecialKind::TimestampWrap,
                            data: 0,
                        }],
                    ));
                }
            }
            last_overflow = Some(overflow);

            let span = now_us - start_us;
            let events = (0..count)
                .map(|i| {
                    let ts = start_us + span * i as i64 / count as i64;
                    let r = rng.next();
                    RawEvent {
                        timestamp: (ts & LOCAL_TS_MASK) as i32,
                        x: (r % width) as u16,
                        y: ((r >> 16) % height) as u16,
                        polarity: (r >> 40) & 1 == 1,
                    }
                })
                .collect();
            delivery.deliver(PacketBatch::events(source_id, overflow, events));
            trace!(count, overflow, "mock event batch");
        }
    }

    fn imu_step(config: &MockSourceConfig) -> impl FnMut(i64, &Delivery) + Send + 'static {
        let source_id = config.source_id;
        move |now_us, delivery| {
            let (local, overflow) = split_device_time(now_us);
            let phase = now_us as f32 / 1_000_000.0;
            let sample = RawImu {
                timestamp: local,
                accel: [0.01 * phase.sin(), 0.0, 1.0],
                gyro: [0.0, 0.5 * phase.cos(), 0.0],
                temperature: 35.0,
            };
            delivery.deliver(PacketBatch::imu(source_id, overflow, vec![sample]));
        }
    }

    fn frame_step(config: &MockSourceConfig) -> impl FnMut(i64, &Delivery) + Send + 'static {
        let source_id = config.source_id;
        let (width, height) = (i32::from(config.width), i32::from(config.height));
        let mut frame_index: u32 = 0;
        move |now_us, delivery| {
            let (local, overflow) = split_device_time(now_us);
            let exposure_us = 5_000;
            // 移动的竖条
            let bar = (frame_index % width.max(1) as u32) as i32;
            let pixels = (0..height)
                .flat_map(|y| {
                    (0..width).map(move |x| {
                        if (x - bar).abs() < 4 {
                            u16::MAX
                        } else {
                            ((x + y) as u32 * 64 % u32::from(u16::MAX)) as u16
                        }
                    })
                })
                .collect();
            frame_index = frame_index.wrapping_add(1);

            let start = (local - exposure_us).max(0);
            let frame = RawFrame {
                ts_start_frame: start,
                ts_end_frame: local,
                exposure: Some(ExposureWindow { start, end: local }),
                width,
                height,
                pixels,
            };
            delivery.deliver(PacketBatch::frames(source_id, overflow, vec![frame]));
        }
    }
}

impl PacketSource for MockPacketSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn source_id(&self) -> i16 {
        self.config.source_id
    }

    fn resolution(&self) -> (u16, u16) {
        (self.config.width, self.config.height)
    }

    fn sample_rate_hz(&self, kind: PacketKind) -> Option<f64> {
        let rate = match kind {
            PacketKind::Event => self.config.event_batch_hz,
            PacketKind::Imu => self.config.imu_rate_hz,
            PacketKind::Frame => self.config.frame_rate_hz,
            PacketKind::Special => return None,
        };
        (rate > 0.0).then_some(rate)
    }

    fn device_time_us(&self) -> i64 {
        self.clock.now_us()
    }

    fn register(&self, handler: Arc<dyn PacketHandler>) {
        *self.handler.write() = Some(handler);
    }

    fn start(&self) -> Result<(), ContractError> {
        if self.config.fail_on_start {
            return Err(ContractError::device_unavailable(
                &self.config.name,
                "simulated device failure",
            ));
        }
        if self.handler.read().is_none() {
            return Err(ContractError::Other(format!(
                "no packet handler registered on '{}'",
                self.config.name
            )));
        }
        // 幂等
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut threads = self.threads.lock();
        let config = &self.config;
        if config.event_batch_hz > 0.0 {
            let interval_us = (1_000_000.0 / config.event_batch_hz) as i64;
            threads.push(self.spawn_stream(
                PacketKind::Event,
                config.event_batch_hz,
                Self::event_step(config, interval_us),
            )?);
        }
        if config.imu_rate_hz > 0.0 {
            threads.push(self.spawn_stream(
                PacketKind::Imu,
                config.imu_rate_hz,
                Self::imu_step(config),
            )?);
        }
        if config.frame_rate_hz > 0.0 {
            threads.push(self.spawn_stream(
                PacketKind::Frame,
                config.frame_rate_hz,
                Self::frame_step(config),
            )?);
        }

        info!(
            device = %config.name,
            width = config.width,
            height = config.height,
            streams = threads.len(),
            "mock packet source started"
        );
        Ok(())
    }

    /// 停止并等待所有投递线程退出
    ///
    /// 不能在回调内部调用。
    fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in threads {
            let _ = handle.join();
        }
        debug!(device = %self.config.name, "mock packet source stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Drop for MockPacketSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CaptureBuffers, IngestionMetrics, StreamRouter};

    fn fast_config() -> MockSourceConfig {
        MockSourceConfig {
            width: 32,
            height: 24,
            event_batch_hz: 200.0,
            events_per_batch: 16,
            imu_rate_hz: 200.0,
            frame_rate_hz: 50.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_split_device_time() {
        assert_eq!(split_device_time(5), (5, 0));
        assert_eq!(split_device_time((1 << 31) + 7), (7, 1));
        assert_eq!(split_device_time((3 << 31) - 1), (i32::MAX, 2));
    }

    #[test]
    fn test_mock_source_delivers_all_streams() {
        let source = MockPacketSource::new(fast_config());
        let buffers = Arc::new(CaptureBuffers::default());
        let router = Arc::new(
            StreamRouter::new(buffers.clone(), Arc::new(IngestionMetrics::new()))
                .with_resolution(32, 24),
        );
        source.register(router.clone());
        source.start().unwrap();
        thread::sleep(Duration::from_millis(150));
        source.stop();

        let snapshot = router.metrics().snapshot();
        assert!(snapshot.events.received > 0);
        assert!(snapshot.imu.received > 0);
        assert!(snapshot.frames.received > 0);
        assert_eq!(snapshot.events.malformed + snapshot.frames.malformed, 0);

        // stop 返回后不再有回调
        let queued = buffers.total_len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(buffers.total_len(), queued);
    }

    #[test]
    fn test_start_without_handler_fails() {
        let source = MockPacketSource::new(fast_config());
        assert!(source.start().is_err());
        assert!(!source.is_running());
    }

    #[test]
    fn test_simulated_device_failure() {
        let source = MockPacketSource::new(MockSourceConfig {
            fail_on_start: true,
            ..fast_config()
        });
        let err = source.start().unwrap_err();
        assert!(matches!(err, ContractError::DeviceUnavailable { .. }));
    }

    #[test]
    fn test_sample_rates() {
        let source = MockPacketSource::new(MockSourceConfig {
            imu_rate_hz: 0.0,
            ..fast_config()
        });
        assert_eq!(source.sample_rate_hz(PacketKind::Frame), Some(50.0));
        assert_eq!(source.sample_rate_hz(PacketKind::Imu), None);
        assert_eq!(source.resolution(), (32, 24));
    }

    #[test]
    fn test_device_clock_starts_at_offset() {
        let source = MockPacketSource::new(MockSourceConfig {
            initial_local_ts_us: i32::MAX - 1_000,
            ..fast_config()
        });
        assert!(source.device_time_us() >= i64::from(i32::MAX) - 1_000);
    }
}
