//! StreamRouter - 驱动回调到 StreamBuffer 的桥梁
//!
//! 在驱动线程上运行：校验、复制 (或持有共享容器)、追加、返回。
//! 不做 I/O，不等待消费者，出错只记录日志，绝不向驱动抛出。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contracts::{BatchPayload, PacketBatch, PacketContainer, PacketHandler, PacketKind};
use tracing::{debug, trace, warn};

use crate::buffer::{BufferSettings, PushOutcome, StreamBuffer};
use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;
use crate::signal::DrainSignal;

/// 缓冲中的数据包引用
///
/// 普通回调的包在回调返回后失效，因此复制一份 (`Owned`)；
/// 容器回调的包通过 `Arc` 持有，直到 DrainLoop 处理完。
#[derive(Debug, Clone)]
pub enum BatchRef {
    Owned(PacketBatch),
    Shared {
        container: Arc<PacketContainer>,
        index: usize,
    },
}

impl BatchRef {
    pub fn batch(&self) -> &PacketBatch {
        match self {
            BatchRef::Owned(batch) => batch,
            BatchRef::Shared { container, index } => &container.batches[*index],
        }
    }

    /// 取得所有权；共享容器仍被其他引用持有时复制该包
    pub fn into_owned(self) -> PacketBatch {
        match self {
            BatchRef::Owned(batch) => batch,
            BatchRef::Shared { container, index } => match Arc::try_unwrap(container) {
                Ok(mut container) => container.batches.swap_remove(index),
                Err(container) => container.batches[index].clone(),
            },
        }
    }
}

/// 排队中的数据包 + 到达时的主机墙钟
#[derive(Debug, Clone)]
pub struct QueuedBatch {
    pub batch: BatchRef,
    /// unix 秒 (毫秒精度)
    pub arrival_unix_s: f64,
}

impl QueuedBatch {
    pub fn now(batch: BatchRef) -> Self {
        Self {
            batch,
            arrival_unix_s: wall_clock_unix_s(),
        }
    }

    pub fn kind(&self) -> PacketKind {
        self.batch.batch().kind()
    }
}

/// 当前主机墙钟 (unix 秒)
pub fn wall_clock_unix_s() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// 三个流的缓冲 + 共享唤醒信号
///
/// 特殊事件与事件流共用一个缓冲，保持两者之间的先后顺序。
pub struct CaptureBuffers {
    events: StreamBuffer<QueuedBatch>,
    imu: StreamBuffer<QueuedBatch>,
    frames: StreamBuffer<QueuedBatch>,
    signal: Arc<DrainSignal>,
}

impl CaptureBuffers {
    pub fn new(settings: BufferSettings) -> Self {
        let signal = Arc::new(DrainSignal::new());
        Self {
            events: StreamBuffer::new(PacketKind::Event, settings, signal.clone()),
            imu: StreamBuffer::new(PacketKind::Imu, settings, signal.clone()),
            frames: StreamBuffer::new(PacketKind::Frame, settings, signal.clone()),
            signal,
        }
    }

    /// 某类数据包对应的缓冲
    pub fn buffer(&self, kind: PacketKind) -> &StreamBuffer<QueuedBatch> {
        match kind {
            PacketKind::Event | PacketKind::Special => &self.events,
            PacketKind::Imu => &self.imu,
            PacketKind::Frame => &self.frames,
        }
    }

    pub fn signal(&self) -> &Arc<DrainSignal> {
        &self.signal
    }

    /// 三个缓冲中排队的包总数
    pub fn total_len(&self) -> usize {
        self.events.len() + self.imu.len() + self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.imu.is_empty() && self.frames.is_empty()
    }
}

impl Default for CaptureBuffers {
    fn default() -> Self {
        Self::new(BufferSettings::default())
    }
}

/// 驱动回调处理器
pub struct StreamRouter {
    buffers: Arc<CaptureBuffers>,
    metrics: Arc<IngestionMetrics>,
    /// 传感器分辨率，用于校验事件坐标
    resolution: Option<(u16, u16)>,
    accepting: AtomicBool,
}

impl StreamRouter {
    pub fn new(buffers: Arc<CaptureBuffers>, metrics: Arc<IngestionMetrics>) -> Self {
        Self {
            buffers,
            metrics,
            resolution: None,
            accepting: AtomicBool::new(true),
        }
    }

    pub fn with_resolution(mut self, width: u16, height: u16) -> Self {
        self.resolution = Some((width, height));
        self
    }

    pub fn buffers(&self) -> &Arc<CaptureBuffers> {
        &self.buffers
    }

    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// 停止接收；之后到达的包被丢弃
    pub fn close(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            debug!("stream router closed");
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Relaxed)
    }

    /// 校验数据包布局
    pub fn validate(&self, expected: PacketKind, batch: &PacketBatch) -> Result<()> {
        let actual = batch.kind();
        let kind_ok = actual == expected
            || (expected == PacketKind::Event && actual == PacketKind::Special);
        if !kind_ok {
            return Err(IngestionError::UnexpectedKind { expected, actual });
        }

        match &batch.payload {
            BatchPayload::Events(events) => {
                if let Some((width, height)) = self.resolution {
                    if let Some(bad) = events.iter().find(|e| e.x >= width || e.y >= height) {
                        return Err(IngestionError::malformed(
                            actual,
                            format!(
                                "event at ({}, {}) outside {}x{} sensor",
                                bad.x, bad.y, width, height
                            ),
                        ));
                    }
                }
            }
            BatchPayload::Frames(frames) => {
                for frame in frames {
                    frame
                        .check_layout()
                        .map_err(|message| IngestionError::malformed(actual, message))?;
                }
            }
            BatchPayload::Imu(_) | BatchPayload::Special(_) => {}
        }
        Ok(())
    }

    fn accept(&self, expected: PacketKind, batch: &PacketBatch) {
        if !self.is_accepting() {
            return;
        }
        if let Err(e) = self.validate(expected, batch) {
            self.metrics.record_malformed(expected);
            warn!(stream = %expected, source_id = batch.source_id, error = %e, "skipping malformed packet");
            return;
        }
        if batch.is_empty() {
            self.metrics.record_empty(batch.kind());
            debug!(stream = %batch.kind(), "skipping empty packet");
            return;
        }
        self.enqueue(BatchRef::Owned(batch.clone()));
    }

    fn enqueue(&self, batch: BatchRef) {
        let inner = batch.batch();
        let kind = inner.kind();
        let samples = inner.len();
        let buffer = self.buffers.buffer(kind);

        let outcome = buffer.push(QueuedBatch::now(batch));
        self.metrics.record_push(kind, samples, outcome);

        match outcome {
            PushOutcome::Accepted => {
                trace!(stream = %kind, samples, "batch queued");
            }
            PushOutcome::EvictedOldest => {
                warn!(stream = %kind, "stream buffer full, evicted oldest batch");
            }
            PushOutcome::Rejected => {
                warn!(stream = %kind, "stream buffer full, rejected new batch");
            }
        }
    }
}

impl PacketHandler for StreamRouter {
    fn on_event_batch(&self, batch: &PacketBatch) {
        self.accept(PacketKind::Event, batch);
    }

    fn on_imu_batch(&self, batch: &PacketBatch) {
        self.accept(PacketKind::Imu, batch);
    }

    fn on_frame_batch(&self, batch: &PacketBatch) {
        self.accept(PacketKind::Frame, batch);
    }

    fn on_container(&self, container: Arc<PacketContainer>) {
        if !self.is_accepting() {
            return;
        }
        for (index, batch) in container.batches.iter().enumerate() {
            let kind = batch.kind();
            if let Err(e) = self.validate(kind, batch) {
                self.metrics.record_malformed(kind);
                warn!(stream = %kind, index, error = %e, "skipping malformed packet in container");
                continue;
            }
            if batch.is_empty() {
                self.metrics.record_empty(kind);
                continue;
            }
            self.enqueue(BatchRef::Shared {
                container: container.clone(),
                index,
            });
        }
    }
}
