//! Shared fixtures for the end-to-end tests.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    ContainerRecord, ContractError, HealthFlag, Micros, PacketBatch, PacketKind, PreviewSink,
    RawEvent, RawFrame, RawImu, RecordSink, StreamDescription,
};
use ingestion::{BatchRef, CaptureBuffers, QueuedBatch};
use recorder::{ContainerReader, Recorder, RecorderOptions};
use sync_engine::{
    DrainCommand, DrainLoop, DrainSettings, DrainStats, StateCell, SynchronizationGate,
};
use tokio::sync::{mpsc, oneshot};

pub const WIDTH: u16 = 64;
pub const HEIGHT: u16 = 48;

pub fn streams() -> Vec<StreamDescription> {
    vec![
        StreamDescription::new(0, "dvs", PacketKind::Event, WIDTH, HEIGHT),
        StreamDescription::new(1, "imu", PacketKind::Imu, 0, 0),
        StreamDescription::new(2, "aps", PacketKind::Frame, WIDTH, HEIGHT),
    ]
}

/// Recorder writing only the container, no sidecars
pub fn container_only(dir: &Path) -> Recorder {
    Recorder::new("container", RecorderOptions {
        output_dir: dir.to_path_buf(),
        file_name: None,
        event_log: false,
        frame_images: false,
        frame_log: false,
        utc_log: false,
        ..Default::default()
    })
}

pub struct Harness<R: RecordSink, P: PreviewSink> {
    pub drain: DrainLoop<R, P>,
    pub buffers: Arc<CaptureBuffers>,
    pub stats: Arc<DrainStats>,
    pub commands: mpsc::UnboundedSender<DrainCommand>,
}

impl<R: RecordSink, P: PreviewSink> Harness<R, P> {
    pub fn new(recorder: R, preview: P, threshold: Micros) -> Self {
        let buffers = Arc::new(CaptureBuffers::default());
        let stats = Arc::new(DrainStats::new());
        let (commands, rx) = mpsc::unbounded_channel();
        let drain = DrainLoop::new(
            buffers.clone(),
            SynchronizationGate::new(threshold, false),
            recorder,
            preview,
            streams(),
            DrainSettings::default(),
            rx,
            stats.clone(),
            Arc::new(StateCell::default()),
        );
        Self {
            drain,
            buffers,
            stats,
            commands,
        }
    }

    pub fn push(&self, batch: PacketBatch) {
        self.buffers
            .buffer(batch.kind())
            .push(QueuedBatch::now(BatchRef::Owned(batch)));
    }

    pub fn start_recording(&mut self, path: &Path) {
        let (reply, mut rx) = oneshot::channel();
        self.commands
            .send(DrainCommand::StartRecording {
                path: path.to_path_buf(),
                reply,
            })
            .unwrap();
        self.drain.process_commands();
        rx.try_recv().unwrap().unwrap();
    }

    pub fn stop_recording(&mut self) -> Option<std::path::PathBuf> {
        let (reply, mut rx) = oneshot::channel();
        self.commands
            .send(DrainCommand::StopRecording { reply })
            .unwrap();
        self.drain.process_commands();
        rx.try_recv().unwrap().unwrap()
    }
}

pub fn events(overflow: i32, stamps: &[i32]) -> PacketBatch {
    PacketBatch::events(
        1,
        overflow,
        stamps
            .iter()
            .enumerate()
            .map(|(i, ts)| RawEvent {
                timestamp: *ts,
                x: (i % WIDTH as usize) as u16,
                y: 3,
                polarity: i % 2 == 0,
            })
            .collect(),
    )
}

pub fn imu(overflow: i32, stamps: &[i32]) -> PacketBatch {
    PacketBatch::imu(
        1,
        overflow,
        stamps
            .iter()
            .map(|ts| RawImu {
                timestamp: *ts,
                accel: [0.0, 0.0, 1.0],
                gyro: [0.5, 0.0, 0.0],
                temperature: 30.0,
            })
            .collect(),
    )
}

pub fn frame(ts: i32) -> PacketBatch {
    PacketBatch::frames(
        1,
        0,
        vec![RawFrame {
            ts_start_frame: ts,
            ts_end_frame: ts + 100,
            exposure: None,
            width: 4,
            height: 2,
            pixels: vec![512; 8],
        }],
    )
}

pub fn read_back(path: &Path) -> Vec<ContainerRecord> {
    ContainerReader::open(path)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

/// Writer that fails from the n-th write call on
pub struct FailingWriter {
    pub calls: Arc<AtomicUsize>,
    pub fail_from: usize,
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.fail_from {
            return Err(io::Error::other("disk full"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Recorder whose first writes block, like a disk that stops responding
pub struct SlowRecorder {
    pub delay: Duration,
    pub stalls: usize,
    pub in_write: Arc<AtomicBool>,
    pub writes: Arc<AtomicUsize>,
    recording: bool,
    health: HealthFlag,
}

impl SlowRecorder {
    /// Already recording; the first `stalls` writes each take `delay`
    pub fn new(delay: Duration, stalls: usize) -> Self {
        Self {
            delay,
            stalls,
            in_write: Arc::new(AtomicBool::new(false)),
            writes: Arc::new(AtomicUsize::new(0)),
            recording: true,
            health: HealthFlag::new(),
        }
    }
}

impl RecordSink for SlowRecorder {
    fn name(&self) -> &str {
        "slow"
    }

    fn start(&mut self, _streams: &[StreamDescription], _path: &Path) -> Result<(), ContractError> {
        self.recording = true;
        Ok(())
    }

    fn write(&mut self, _record: &ContainerRecord) -> Result<(), ContractError> {
        if self.stalls > 0 {
            self.stalls -= 1;
            self.in_write.store(true, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_write.store(false, Ordering::SeqCst);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<PathBuf, ContractError> {
        self.recording = false;
        Ok(PathBuf::from("slow.dvsrec"))
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn health(&self) -> HealthFlag {
        self.health.clone()
    }
}
