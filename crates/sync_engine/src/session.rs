//! CaptureSession - 组装驱动、缓冲、DrainLoop 与输出端
//!
//! 启动顺序: 缓冲 -> 路由注册 -> DrainLoop 线程 -> 设备启动 -> (可选) 时钟标定。
//! 关闭顺序相反：先停设备，再关闭路由，最后等待 DrainLoop 完成最后一次换出。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{
    CaptureConfig, HealthFlag, PacketSource, PreviewSink, RecordSink, StreamDescription,
};
use ingestion::{BufferSettings, CaptureBuffers, IngestionMetrics, MetricsSnapshot, StreamRouter};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, instrument, warn};

use crate::calibration::calibrate_live;
use crate::engine::{DrainCommand, DrainLoop, DrainOutcome, DrainSettings};
use crate::error::{Result, SessionError};
use crate::gate::SynchronizationGate;
use crate::stats::{DrainSnapshot, DrainState, DrainStats, StateCell};

/// 会话结束后的汇总
pub struct SessionReport<R, P> {
    /// 最后一次录制的输出文件
    pub output: Option<PathBuf>,
    pub drain: DrainSnapshot,
    pub ingestion: MetricsSnapshot,
    pub recorder_ok: bool,
    pub elapsed: Duration,
    pub recorder: R,
    pub preview: P,
}

/// 一次采集会话
pub struct CaptureSession<R, P> {
    source: Arc<dyn PacketSource>,
    router: Arc<StreamRouter>,
    buffers: Arc<CaptureBuffers>,
    commands: mpsc::UnboundedSender<DrainCommand>,
    drain: Option<JoinHandle<DrainOutcome<R, P>>>,
    stats: Arc<DrainStats>,
    state: Arc<StateCell>,
    health: HealthFlag,
    streams: Vec<StreamDescription>,
    last_output: Option<PathBuf>,
    started_at: Instant,
}

impl<R, P> CaptureSession<R, P>
where
    R: RecordSink + 'static,
    P: PreviewSink + 'static,
{
    /// 启动会话
    ///
    /// # Errors
    /// 设备无法启动时返回 `SessionError::DeviceUnavailable`，此时不会有任何数据被记录。
    #[instrument(name = "capture_session_start", skip_all, fields(device = source.name()))]
    pub fn start(
        source: Arc<dyn PacketSource>,
        config: &CaptureConfig,
        recorder: R,
        preview: P,
    ) -> Result<Self> {
        let buffers = Arc::new(CaptureBuffers::new(BufferSettings::from(&config.buffers)));
        let metrics = Arc::new(IngestionMetrics::new());
        let (width, height) = source.resolution();
        let router = Arc::new(
            StreamRouter::new(buffers.clone(), metrics).with_resolution(width, height),
        );
        source.register(router.clone());

        let streams = source.stream_descriptions();
        let health = recorder.health();
        let stats = Arc::new(DrainStats::new());
        let state = Arc::new(StateCell::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let gate = SynchronizationGate::new(
            config.capture.start_threshold_us,
            config.preview.burn_in_timestamp,
        );
        let drain_loop = DrainLoop::new(
            buffers.clone(),
            gate,
            recorder,
            preview,
            streams.clone(),
            DrainSettings::from(config),
            rx,
            stats.clone(),
            state.clone(),
        );
        let drain = thread::Builder::new()
            .name("drain-loop".to_string())
            .spawn(move || drain_loop.run())?;

        let mut session = Self {
            source,
            router,
            buffers,
            commands: tx,
            drain: Some(drain),
            stats,
            state,
            health,
            streams,
            last_output: None,
            started_at: Instant::now(),
        };

        if let Err(e) = session.source.start() {
            session.router.close();
            session.shutdown_drain();
            return Err(SessionError::DeviceUnavailable(e));
        }
        info!(
            threshold = %config.capture.start_threshold_us,
            tick_ms = config.capture.tick_interval_ms,
            "capture session started"
        );

        if config.calibration.enabled {
            session.calibrate(
                config.calibration.probes,
                Duration::from_millis(config.calibration.spacing_ms),
            );
        }
        Ok(session)
    }

    /// 标定设备时钟；失败只记录警告，不影响采集
    fn calibrate(&mut self, probes: usize, spacing: Duration) {
        let source = self.source.clone();
        match calibrate_live(|| source.device_time_us(), probes, spacing) {
            Ok(calibration) => {
                let _ = self
                    .commands
                    .send(DrainCommand::SetCalibration(Some(calibration)));
            }
            Err(e) => warn!(error = %e, "clock calibration failed, wall-clock stamps disabled"),
        }
    }

    fn send(&self, command: DrainCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::DrainStopped)?;
        self.buffers.signal().notify_data();
        Ok(())
    }

    /// 开始录制到 `path`
    ///
    /// 阻塞直到 DrainLoop 处理该命令。
    pub fn start_recording(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(DrainCommand::StartRecording {
            path: path.as_ref().to_path_buf(),
            reply,
        })?;
        rx.blocking_recv()
            .map_err(|_| SessionError::DrainStopped)?
            .map_err(SessionError::Recorder)
    }

    /// 结束录制，返回输出文件
    ///
    /// 已缓冲的数据先写完再关闭文件。录制已因写入失败被 DrainLoop 停止时，
    /// 返回那个不完整的文件，由调用方决定保留或删除。
    pub fn stop_recording(&mut self) -> Result<Option<PathBuf>> {
        let (reply, rx) = oneshot::channel();
        self.send(DrainCommand::StopRecording { reply })?;
        let output = rx
            .blocking_recv()
            .map_err(|_| SessionError::DrainStopped)?
            .map_err(SessionError::Recorder)?;
        if output.is_some() {
            self.last_output.clone_from(&output);
        }
        Ok(output)
    }

    /// Recorder 健康标志 (UI 可轮询)
    ///
    /// 清除后 DrainLoop 会自行停止录制，预览不受影响。
    pub fn record_health(&self) -> &HealthFlag {
        &self.health
    }

    pub fn stats(&self) -> DrainSnapshot {
        self.stats.snapshot()
    }

    pub fn ingestion_metrics(&self) -> MetricsSnapshot {
        self.router.metrics().snapshot()
    }

    pub fn state(&self) -> DrainState {
        self.state.get()
    }

    pub fn streams(&self) -> &[StreamDescription] {
        &self.streams
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// DrainLoop 是否已自行退出 (例如录制失败后请求关闭)
    pub fn is_finished(&self) -> bool {
        self.buffers.signal().is_shutdown()
            || self.drain.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// 请求关闭；不等待
    pub fn request_shutdown(&self) {
        self.buffers.signal().shutdown();
    }

    fn shutdown_drain(&mut self) -> Option<thread::Result<DrainOutcome<R, P>>> {
        self.buffers.signal().shutdown();
        self.drain.take().map(JoinHandle::join)
    }

    /// 停止会话
    ///
    /// 设备先停止，DrainLoop 完成最后一次换出；仍在录制时关闭文件。
    #[instrument(name = "capture_session_stop", skip_all)]
    pub fn stop(mut self) -> Result<SessionReport<R, P>> {
        self.source.stop();
        self.router.close();

        let outcome = match self.shutdown_drain() {
            Some(Ok(outcome)) => outcome,
            Some(Err(_)) => return Err(SessionError::DrainPanicked),
            None => return Err(SessionError::DrainStopped),
        };
        let DrainOutcome {
            mut recorder,
            preview,
            partial,
        } = outcome;

        let mut output = partial.or_else(|| self.last_output.take());
        if recorder.is_recording() {
            output = Some(recorder.stop().map_err(SessionError::Recorder)?);
        }

        let report = SessionReport {
            output,
            drain: self.stats.snapshot(),
            ingestion: self.router.metrics().snapshot(),
            recorder_ok: recorder.is_ok(),
            elapsed: self.started_at.elapsed(),
            recorder,
            preview,
        };
        info!(
            ticks = report.drain.ticks,
            records = report.drain.records_submitted,
            dropped = report.ingestion.total_dropped(),
            "capture session stopped"
        );
        Ok(report)
    }
}

impl<R, P> Drop for CaptureSession<R, P> {
    fn drop(&mut self) {
        if let Some(handle) = self.drain.take() {
            self.source.stop();
            self.router.close();
            self.buffers.signal().shutdown();
            let _ = handle.join();
        }
    }
}
