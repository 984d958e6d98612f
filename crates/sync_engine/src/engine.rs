//! DrainLoop - 唯一的消费者
//!
//! 每个节拍按优先级 (event -> imu -> frame) 换出各 StreamBuffer，
//! 释放锁后逐包经过 SynchronizationGate，再交给 Recorder 与 PreviewRenderer。
//!
//! - 积压超过阈值时跳过预览，但每条记录仍然写入 Recorder
//! - 所有缓冲为空时在条件变量上等待，新数据与关闭请求都会立即唤醒
//! - Recorder 健康标志清除后在本次换出结束时停止录制，预览继续
//! - 关闭后再做一次完整换出，避免丢失已缓冲的数据

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    BatchPayload, CaptureConfig, ContainerRecord, ContractError, EventSample, FrameSample,
    ImuSample, PacketBatch, PacketKind, PreviewItem, PreviewSink, RawFrame, RecordSink,
    SpecialKind, StreamDescription,
};
use ingestion::{CaptureBuffers, QueuedBatch, WakeReason};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::calibration::ClockCalibration;
use crate::gate::SynchronizationGate;
use crate::stats::{DrainState, DrainStats, StateCell};
use crate::timestamp::{reconstruct, EpochTracker, Monotonicity, TimestampReconstructor};

/// DrainLoop 参数
#[derive(Debug, Clone)]
pub struct DrainSettings {
    /// 目标节拍
    pub tick_interval: Duration,
    /// 无数据时的最长等待
    pub idle_wait: Duration,
    /// 积压 (排队的包数) 达到该值时跳过预览
    pub backlog_threshold: usize,
    /// 忽略积压，始终更新预览
    pub lossless_preview: bool,
    /// 录制失败时除停止录制外，还请求关闭整个采集
    pub stop_on_record_failure: bool,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for DrainSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            tick_interval: config.capture.tick_interval(),
            idle_wait: config.capture.idle_wait(),
            backlog_threshold: config.capture.preview_backlog_threshold,
            lossless_preview: config.capture.lossless_preview,
            stop_on_record_failure: config.capture.stop_on_record_failure,
        }
    }
}

/// 会话发给 DrainLoop 的命令
///
/// Recorder 只在 DrainLoop 线程上使用，开始/结束录制也在这里执行。
#[derive(Debug)]
pub enum DrainCommand {
    StartRecording {
        path: PathBuf,
        reply: oneshot::Sender<Result<(), ContractError>>,
    },
    StopRecording {
        reply: oneshot::Sender<Result<Option<PathBuf>, ContractError>>,
    },
    SetCalibration(Option<ClockCalibration>),
}

/// DrainLoop 退出后交还的输出端
pub struct DrainOutcome<R, P> {
    pub recorder: R,
    pub preview: P,
    /// 因写入失败而停止、尚未交给会话的录制文件
    pub partial: Option<PathBuf>,
}

/// 一次换出的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub backlog: usize,
    pub batches: usize,
    pub records: usize,
    pub preview_skipped: usize,
}

fn stream_slot(kind: PacketKind) -> usize {
    match kind {
        PacketKind::Event | PacketKind::Special => 0,
        PacketKind::Imu => 1,
        PacketKind::Frame => 2,
    }
}

/// 单消费者循环
pub struct DrainLoop<R, P> {
    buffers: Arc<CaptureBuffers>,
    gate: SynchronizationGate,
    timestamps: TimestampReconstructor,
    recorder: R,
    preview: P,
    streams: Vec<StreamDescription>,
    settings: DrainSettings,
    commands: mpsc::UnboundedReceiver<DrainCommand>,
    trackers: [EpochTracker; 3],
    stats: Arc<DrainStats>,
    state: Arc<StateCell>,
    failure_reported: bool,
    recording_path: Option<PathBuf>,
    partial: Option<PathBuf>,
}

impl<R: RecordSink, P: PreviewSink> DrainLoop<R, P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        buffers: Arc<CaptureBuffers>,
        gate: SynchronizationGate,
        recorder: R,
        preview: P,
        streams: Vec<StreamDescription>,
        settings: DrainSettings,
        commands: mpsc::UnboundedReceiver<DrainCommand>,
        stats: Arc<DrainStats>,
        state: Arc<StateCell>,
    ) -> Self {
        Self {
            buffers,
            gate,
            timestamps: TimestampReconstructor::default(),
            recorder,
            preview,
            streams,
            settings,
            commands,
            trackers: Default::default(),
            stats,
            state,
            failure_reported: false,
            recording_path: None,
            partial: None,
        }
    }

    pub fn with_calibration(mut self, calibration: Option<ClockCalibration>) -> Self {
        self.timestamps.set_calibration(calibration);
        self
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn preview(&self) -> &P {
        &self.preview
    }

    /// 运行直到收到关闭信号
    #[instrument(name = "drain_loop_run", skip(self), fields(tick_ms = self.settings.tick_interval.as_millis() as u64))]
    pub fn run(mut self) -> DrainOutcome<R, P> {
        self.state.set(DrainState::Running);
        let signal = self.buffers.signal().clone();
        info!("drain loop started");

        loop {
            self.process_commands();

            if self.buffers.is_empty() {
                match signal.wait_for_data(self.settings.idle_wait) {
                    WakeReason::Shutdown => break,
                    WakeReason::Data | WakeReason::Timeout => continue,
                }
            }

            let started = Instant::now();
            self.drain_pass();
            if signal.is_shutdown() {
                break;
            }

            let elapsed = started.elapsed();
            if elapsed < self.settings.tick_interval
                && signal.wait_for_shutdown(self.settings.tick_interval - elapsed)
            {
                break;
            }
        }

        self.state.set(DrainState::Stopping);
        self.process_commands();
        let last = self.drain_pass();
        debug!(batches = last.batches, "final drain pass completed");
        self.state.set(DrainState::Idle);
        info!("drain loop stopped");

        DrainOutcome {
            recorder: self.recorder,
            preview: self.preview,
            partial: self.partial,
        }
    }

    /// 处理所有待执行命令
    pub fn process_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                DrainCommand::StartRecording { path, reply } => {
                    let result = self.start_recording(path);
                    let _ = reply.send(result);
                }
                DrainCommand::StopRecording { reply } => {
                    let result = self.stop_recording();
                    let _ = reply.send(result);
                }
                DrainCommand::SetCalibration(calibration) => {
                    if let Some(c) = &calibration {
                        info!(offset_ms = c.offset_ms(), "wall-clock calibration applied");
                    }
                    self.timestamps.set_calibration(calibration);
                }
            }
        }
    }

    fn start_recording(&mut self, path: PathBuf) -> Result<(), ContractError> {
        if self.recorder.is_recording() {
            return Err(ContractError::Other(format!(
                "recorder '{}' is already recording",
                self.recorder.name()
            )));
        }
        self.recorder.start(&self.streams, &path)?;
        self.failure_reported = false;
        self.partial = None;
        info!(path = %path.display(), "recording started");
        self.recording_path = Some(path);
        Ok(())
    }

    /// 结束录制
    ///
    /// 录制已因写入失败被停止时，返回那个不完整的文件 (只返回一次)。
    fn stop_recording(&mut self) -> Result<Option<PathBuf>, ContractError> {
        if !self.recorder.is_recording() {
            return Ok(self.partial.take());
        }
        // 先把已缓冲的数据写完
        self.drain_pass();
        if !self.recorder.is_recording() {
            return Ok(self.partial.take());
        }
        self.recording_path = None;
        let path = self.recorder.stop()?;
        info!(path = %path.display(), "recording stopped");
        Ok(Some(path))
    }

    /// 一次完整换出
    pub fn drain_pass(&mut self) -> PassReport {
        let started = Instant::now();
        let signal = self.buffers.signal().clone();
        signal.clear_pending();

        let mut report = PassReport {
            backlog: self.buffers.total_len(),
            ..Default::default()
        };
        self.stats.observe_backlog(report.backlog);
        let mut remaining = report.backlog;

        for kind in PacketKind::STREAMS {
            let drained = self.buffers.buffer(kind).drain_all();
            observability::record_buffer_depth(kind.as_str(), drained.len());
            if drained.is_empty() {
                continue;
            }
            trace!(stream = %kind, batches = drained.len(), "drained stream buffer");

            for queued in drained {
                remaining = remaining.saturating_sub(1);
                let preview = self.settings.lossless_preview
                    || remaining < self.settings.backlog_threshold;
                let (records, skipped) = self.process(queued, preview);
                report.batches += 1;
                report.records += records;
                report.preview_skipped += skipped;
            }
        }

        if report.batches > 0 {
            self.stats.add_batches(report.batches as u64);
            self.stats.add_preview_skipped(report.preview_skipped as u64);
            if self.recorder.is_recording() {
                self.stats.add_records(report.records as u64);
                if let Err(e) = self.recorder.flush() {
                    warn!(error = %e, "recorder flush failed");
                }
            }
        }
        self.check_recorder_health(&signal);

        self.stats.add_ticks(1);
        observability::record_drain_pass(
            started.elapsed().as_secs_f64() * 1000.0,
            report.backlog,
            report.batches,
        );
        report
    }

    /// 健康标志清除后停止录制，保留已写入的部分文件；预览与采集继续
    fn check_recorder_health(&mut self, signal: &ingestion::DrainSignal) {
        if self.recorder.is_ok() || self.failure_reported {
            return;
        }
        self.failure_reported = true;
        if self.recorder.is_recording() {
            let expected = self.recording_path.take();
            match self.recorder.stop() {
                Ok(path) => {
                    error!(
                        recorder = self.recorder.name(),
                        path = %path.display(),
                        "recording stopped after write failure, partial file kept"
                    );
                    self.partial = Some(path);
                }
                Err(e) => {
                    error!(
                        recorder = self.recorder.name(),
                        path = ?expected,
                        error = %e,
                        "recording stopped after write failure, closing the partial file failed"
                    );
                    self.partial = expected;
                }
            }
            self.stats.add_recordings_aborted(1);
        }
        if self.settings.stop_on_record_failure {
            warn!("stopping capture after recorder failure");
            signal.shutdown();
        }
    }

    /// 处理一个包，返回 (提交的记录数, 跳过的预览数)
    fn process(&mut self, queued: QueuedBatch, preview: bool) -> (usize, usize) {
        let arrival_unix_s = queued.arrival_unix_s;
        let kind = queued.kind();
        match kind {
            PacketKind::Frame => {
                let batch = queued.batch.into_owned();
                let overflow = batch.overflow_counter;
                match batch.payload {
                    BatchPayload::Frames(frames) => {
                        self.process_frames(frames, overflow, arrival_unix_s, preview)
                    }
                    _ => (0, 0),
                }
            }
            PacketKind::Event => self.process_events(queued.batch.batch(), preview),
            PacketKind::Imu => self.process_imu(queued.batch.batch(), preview),
            PacketKind::Special => {
                self.process_special(queued.batch.batch());
                (0, 0)
            }
        }
    }

    fn observe_epoch(&mut self, kind: PacketKind, first: i64, last: i64) {
        if let Monotonicity::Regressed { previous } =
            self.trackers[stream_slot(kind)].observe_batch(first, last)
        {
            self.stats.add_regressions(1);
            warn!(
                stream = %kind,
                previous,
                current = first,
                "timestamp went backwards without a reset"
            );
        }
    }

    fn process_events(&mut self, batch: &PacketBatch, preview: bool) -> (usize, usize) {
        let BatchPayload::Events(raw) = &batch.payload else {
            return (0, 0);
        };

        let mut admitted = Vec::with_capacity(raw.len());
        let mut rejected = 0u64;
        let mut invalid = 0u64;
        let mut span: Option<(i64, i64)> = None;

        for event in raw {
            let timestamp_us = reconstruct(event.timestamp, batch.overflow_counter);
            if timestamp_us < 0 {
                invalid += 1;
                continue;
            }
            span = Some(match span {
                None => (timestamp_us, timestamp_us),
                Some((first, _)) => (first, timestamp_us),
            });
            let sample = EventSample {
                timestamp_us,
                x: event.x,
                y: event.y,
                polarity: event.polarity,
            };
            if self.gate.admit(&sample) {
                admitted.push(sample);
            } else {
                rejected += 1;
            }
        }

        if let Some((first, last)) = span {
            self.observe_epoch(PacketKind::Event, first, last);
        }
        self.count_dropped(PacketKind::Event, rejected, invalid);
        if admitted.is_empty() {
            return (0, 0);
        }

        let (stream_id, width, height) = self.stream_info(PacketKind::Event);
        let record = ContainerRecord::EventArray {
            stream_id,
            timestamp_us: admitted[0].timestamp_us,
            width,
            height,
            events: admitted,
        };
        self.write(&record);

        let ContainerRecord::EventArray { events, .. } = &record else {
            return (1, 0);
        };
        (1, self.update_preview(PacketKind::Event, PreviewItem::Events(events), preview))
    }

    fn process_imu(&mut self, batch: &PacketBatch, preview: bool) -> (usize, usize) {
        let BatchPayload::Imu(raw) = &batch.payload else {
            return (0, 0);
        };
        let (stream_id, _, _) = self.stream_info(PacketKind::Imu);
        let mut records = 0;
        let mut skipped = 0;
        let mut rejected = 0u64;
        let mut invalid = 0u64;

        for imu in raw {
            let timestamp_us = reconstruct(imu.timestamp, batch.overflow_counter);
            if timestamp_us < 0 {
                invalid += 1;
                continue;
            }
            self.observe_epoch(PacketKind::Imu, timestamp_us, timestamp_us);

            let sample = ImuSample {
                timestamp_us,
                accel: imu.accel,
                gyro: imu.gyro,
                temperature: imu.temperature,
            };
            if !self.gate.admit(&sample) {
                rejected += 1;
                continue;
            }
            self.write(&ContainerRecord::Imu { stream_id, sample });
            records += 1;
            skipped += self.update_preview(PacketKind::Imu, PreviewItem::Imu(&sample), preview);
        }

        self.count_dropped(PacketKind::Imu, rejected, invalid);
        (records, skipped)
    }

    fn process_frames(
        &mut self,
        frames: Vec<RawFrame>,
        overflow: i32,
        arrival_unix_s: f64,
        preview: bool,
    ) -> (usize, usize) {
        let (stream_id, _, _) = self.stream_info(PacketKind::Frame);
        let mut records = 0;
        let mut skipped = 0;
        let mut rejected = 0u64;
        let mut invalid = 0u64;

        for raw in frames {
            let timestamp_us = reconstruct(raw.ts_start_frame, overflow);
            if timestamp_us < 0 {
                invalid += 1;
                continue;
            }
            if raw.pixels.is_empty() || raw.width <= 0 || raw.height <= 0 {
                self.stats.add_empty_frames(1);
                warn!(timestamp_us, "empty frame from driver, skipping");
                continue;
            }
            self.observe_epoch(PacketKind::Frame, timestamp_us, timestamp_us);

            let mut frame = FrameSample {
                timestamp_us,
                width: raw.width,
                height: raw.height,
                pixels: raw.pixels,
                exposure_us: raw.exposure.map(|e| e.duration_us()),
            };
            if !self.gate.admit_frame(&mut frame) {
                rejected += 1;
                continue;
            }

            let record = ContainerRecord::Image {
                stream_id,
                wall_clock_ms: self.timestamps.wall_clock_ms(timestamp_us),
                arrival_unix_s,
                frame,
            };
            self.write(&record);
            records += 1;

            if let ContainerRecord::Image { frame, .. } = &record {
                skipped += self.update_preview(PacketKind::Frame, PreviewItem::Frame(frame), preview);
            }
        }

        self.count_dropped(PacketKind::Frame, rejected, invalid);
        (records, skipped)
    }

    fn process_special(&mut self, batch: &PacketBatch) {
        let BatchPayload::Special(specials) = &batch.payload else {
            return;
        };
        for special in specials {
            match special.kind {
                SpecialKind::TimestampReset => {
                    for tracker in &mut self.trackers {
                        tracker.reset();
                    }
                    self.stats.add_resets(1);
                    info!(source_id = batch.source_id, "device timestamp reset");
                }
                SpecialKind::TimestampWrap => {
                    debug!(overflow = batch.overflow_counter, "device timestamp wrapped");
                }
                SpecialKind::DataDropped => {
                    self.stats.add_data_dropped(1);
                    warn!(dropped = special.data, "device reported dropped data");
                }
                SpecialKind::TooManyEvents => {
                    warn!("device reported too many events");
                }
                SpecialKind::ExternalInputRising
                | SpecialKind::ExternalInputFalling
                | SpecialKind::ExternalInputPulse => {
                    debug!(kind = ?special.kind, timestamp = special.timestamp, "external input");
                }
                SpecialKind::Other(code) => {
                    trace!(code, "unhandled special event");
                }
            }
        }
    }

    fn stream_info(&self, kind: PacketKind) -> (u16, u16, u16) {
        self.streams
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| (s.stream_id, s.width, s.height))
            .unwrap_or((stream_slot(kind) as u16, 0, 0))
    }

    fn count_dropped(&self, kind: PacketKind, rejected: u64, invalid: u64) {
        if rejected > 0 {
            self.stats.add_rejected(rejected);
            observability::record_samples_rejected(kind.as_str(), rejected);
        }
        if invalid > 0 {
            self.stats.add_invalid(invalid);
            trace!(stream = %kind, invalid, "dropped samples with invalid timestamps");
        }
    }

    /// 写入一条记录；失败只影响健康标志，不中断循环
    fn write(&mut self, record: &ContainerRecord) {
        if !self.recorder.is_recording() {
            return;
        }
        if let Err(e) = self.recorder.write(record) {
            self.stats.add_record_failures(1);
            observability::record_write_failure(record.kind().as_str());
            if !self.failure_reported {
                error!(stream = %record.kind(), error = %e, "recorder write failed");
            } else {
                trace!(stream = %record.kind(), error = %e, "recorder write failed");
            }
        }
    }

    /// 返回跳过的预览数 (0 或 1)
    fn update_preview(&mut self, kind: PacketKind, item: PreviewItem<'_>, allowed: bool) -> usize {
        if allowed {
            self.preview.update(item);
            self.stats.add_preview_updates(1);
            0
        } else {
            observability::record_preview_skipped(kind.as_str());
            1
        }
    }
}
