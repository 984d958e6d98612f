//! Recorder - container file plus optional sidecars
//!
//! Only ever driven from the DrainLoop thread. A failed write clears the
//! shared [`HealthFlag`]; later writes are still attempted so a transient
//! error does not silently stop the recording.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use contracts::{
    ContainerRecord, ContractError, HealthFlag, PacketKind, RecordSink, RecordingConfig,
    StreamDescription,
};
use tracing::{debug, error, info, instrument, warn};

use crate::container::{ContainerWriter, EXTENSION};
use crate::error::{RecorderError, Result};
use crate::metrics::RecorderMetrics;
use crate::sinks::{EventLogWriter, FrameDump, UtcMapWriter};

/// Default file name for a recording started at `started`
pub fn temp_file_name(started: &DateTime<Local>) -> String {
    format!(
        "temp_dvs_capture_{}.{EXTENSION}",
        started.format("%Y_%m_%d-%H_%M_%S")
    )
}

/// Move a finished recording to its destination
///
/// Falls back to copy + remove when a rename is not possible (e.g. across
/// filesystems).
pub fn finalize_to(path: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<PathBuf> {
    let (path, destination) = (path.as_ref(), destination.as_ref());
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    if let Err(e) = fs::rename(path, destination) {
        debug!(error = %e, "rename failed, copying recording instead");
        fs::copy(path, destination)?;
        fs::remove_file(path)?;
    }
    info!(from = %path.display(), to = %destination.display(), "recording finalized");
    Ok(destination.to_path_buf())
}

/// Recorder options
#[derive(Debug, Clone)]
pub struct RecorderOptions {
    pub output_dir: PathBuf,
    pub file_name: Option<String>,
    /// Empty = record everything
    pub record_kinds: HashSet<PacketKind>,
    pub event_log: bool,
    pub frame_images: bool,
    pub frame_log: bool,
    pub utc_log: bool,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self::from(&RecordingConfig::default())
    }
}

impl From<&RecordingConfig> for RecorderOptions {
    fn from(config: &RecordingConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            file_name: config.file_name.clone(),
            record_kinds: config.record_kinds.iter().copied().collect(),
            event_log: config.event_log,
            frame_images: config.frame_images,
            frame_log: config.frame_log,
            utc_log: config.utc_log,
        }
    }
}

impl RecorderOptions {
    pub fn records(&self, kind: PacketKind) -> bool {
        self.record_kinds.is_empty() || self.record_kinds.contains(&kind)
    }
}

/// Sidecar outputs of one recording
#[derive(Default)]
struct Sidecars {
    event_log: Option<EventLogWriter>,
    frames: Option<FrameDump>,
    utc: Option<UtcMapWriter>,
}

impl Sidecars {
    fn open(
        options: &RecorderOptions,
        dir: &Path,
        streams: &[StreamDescription],
        started: &DateTime<Local>,
    ) -> Result<Self> {
        let name_of = |kind: PacketKind| {
            streams
                .iter()
                .find(|s| s.kind == kind)
                .map_or_else(|| kind.as_str().to_string(), |s| s.name.clone())
        };
        let mut sidecars = Self::default();
        if options.event_log && options.records(PacketKind::Event) {
            sidecars.event_log = Some(EventLogWriter::create(
                dir.join(format!("{}.bin", name_of(PacketKind::Event))),
            )?);
        }
        if (options.frame_images || options.frame_log) && options.records(PacketKind::Frame) {
            sidecars.frames = Some(FrameDump::create(
                dir,
                &name_of(PacketKind::Frame),
                options.frame_images,
                options.frame_log,
            )?);
        }
        if options.utc_log && options.records(PacketKind::Frame) {
            sidecars.utc = Some(UtcMapWriter::create(dir, started)?);
        }
        Ok(sidecars)
    }

    fn write(&mut self, record: &ContainerRecord) -> Result<()> {
        match record {
            ContainerRecord::EventArray { events, .. } => {
                if let Some(log) = &mut self.event_log {
                    log.push(events);
                }
            }
            ContainerRecord::Image {
                frame,
                arrival_unix_s,
                ..
            } => {
                if let Some(frames) = &mut self.frames {
                    frames.write(frame, frame.timestamp_us)?;
                }
                if let Some(utc) = &mut self.utc {
                    utc.record(frame.timestamp_us, *arrival_unix_s)?;
                }
            }
            ContainerRecord::Imu { .. } => {}
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(log) = &mut self.event_log {
            log.flush()?;
        }
        if let Some(frames) = &mut self.frames {
            frames.flush()?;
        }
        if let Some(utc) = &mut self.utc {
            utc.flush()?;
        }
        Ok(())
    }
}

struct ActiveRecording {
    path: PathBuf,
    writer: ContainerWriter<Box<dyn Write + Send>>,
    sidecars: Sidecars,
}

/// Container recorder
pub struct Recorder {
    name: String,
    options: RecorderOptions,
    health: HealthFlag,
    metrics: Arc<RecorderMetrics>,
    active: Option<ActiveRecording>,
}

impl Recorder {
    pub fn new(name: impl Into<String>, options: RecorderOptions) -> Self {
        Self {
            name: name.into(),
            options,
            health: HealthFlag::new(),
            metrics: Arc::new(RecorderMetrics::new()),
            active: None,
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new("container", RecorderOptions::from(config))
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    pub fn metrics(&self) -> &Arc<RecorderMetrics> {
        &self.metrics
    }

    /// Path for the next recording: configured name or a temporary default
    pub fn next_path(&self) -> PathBuf {
        let file_name = self
            .options
            .file_name
            .clone()
            .unwrap_or_else(|| temp_file_name(&Local::now()));
        self.options.output_dir.join(file_name)
    }

    /// Path of the open recording
    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// Start with a caller-provided writer for the container stream
    ///
    /// Sidecars are still created next to `path`.
    #[instrument(name = "recorder_start", skip(self, streams, writer), fields(recorder = %self.name))]
    pub fn start_with_writer(
        &mut self,
        streams: &[StreamDescription],
        path: &Path,
        writer: Box<dyn Write + Send>,
    ) -> Result<()> {
        if self.active.is_some() {
            return Err(RecorderError::AlreadyRecording(self.name.clone()));
        }
        let started = Local::now();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let recorded: Vec<StreamDescription> = streams
            .iter()
            .filter(|s| self.options.records(s.kind))
            .cloned()
            .collect();
        let writer = ContainerWriter::new(writer, &recorded)?;
        let sidecars = Sidecars::open(&self.options, dir, &recorded, &started)?;

        self.active = Some(ActiveRecording {
            path: path.to_path_buf(),
            writer,
            sidecars,
        });
        self.health.reset();
        self.metrics.inc_recordings();
        info!(path = %path.display(), streams = recorded.len(), "recording opened");
        Ok(())
    }

    fn open_file(&mut self, streams: &[StreamDescription], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        self.start_with_writer(streams, path, Box::new(BufWriter::new(file)))
    }

    fn append(&mut self, record: &ContainerRecord) -> Result<()> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| RecorderError::NotRecording(self.name.clone()))?;
        let bytes = active.writer.append(record)?;
        active.sidecars.write(record)?;
        self.metrics.inc_written(bytes);
        Ok(())
    }

    fn fail(&self, err: RecorderError) -> ContractError {
        self.metrics.inc_failure_count();
        if self.health.mark_failed() {
            error!(recorder = %self.name, error = %err, "recorder write failed, health flag cleared");
        }
        ContractError::record_write(&self.name, err.to_string())
    }
}

impl RecordSink for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, streams: &[StreamDescription], path: &Path) -> std::result::Result<(), ContractError> {
        self.open_file(streams, path).map_err(|e| match e {
            RecorderError::AlreadyRecording(_) => ContractError::Other(e.to_string()),
            other => ContractError::record_write(&self.name, other.to_string()),
        })
    }

    fn write(&mut self, record: &ContainerRecord) -> std::result::Result<(), ContractError> {
        if !self.options.records(record.kind()) {
            self.metrics.inc_filtered_count();
            return Ok(());
        }
        match self.append(record) {
            Ok(()) => Ok(()),
            Err(RecorderError::NotRecording(name)) => Err(ContractError::not_recording(name)),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn flush(&mut self) -> std::result::Result<(), ContractError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        let result = active
            .writer
            .flush()
            .and_then(|()| active.sidecars.flush());
        result.map_err(|e| self.fail(e))
    }

    #[instrument(name = "recorder_stop", skip(self), fields(recorder = %self.name))]
    fn stop(&mut self) -> std::result::Result<PathBuf, ContractError> {
        let mut active = self
            .active
            .take()
            .ok_or_else(|| ContractError::not_recording(&self.name))?;

        let records = active.writer.records();
        let bytes = active.writer.bytes_written();
        let sidecars = active.sidecars.flush();
        let container = active.writer.finish().map(drop);
        if let Err(e) = sidecars.and(container) {
            warn!(path = %active.path.display(), "recording closed with errors");
            return Err(self.fail(e));
        }
        info!(path = %active.path.display(), records, bytes, "recording closed");
        Ok(active.path)
    }

    fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    fn health(&self) -> HealthFlag {
        self.health.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerReader;
    use contracts::{EventSample, FrameSample, ImuSample};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn streams() -> Vec<StreamDescription> {
        vec![
            StreamDescription::new(0, "dvs", PacketKind::Event, 8, 6),
            StreamDescription::new(1, "imu", PacketKind::Imu, 0, 0),
            StreamDescription::new(2, "aps", PacketKind::Frame, 8, 6),
        ]
    }

    fn event_record(ts: i64) -> ContainerRecord {
        ContainerRecord::EventArray {
            stream_id: 0,
            timestamp_us: ts,
            width: 8,
            height: 6,
            events: vec![EventSample {
                timestamp_us: ts,
                x: 1,
                y: 1,
                polarity: true,
            }],
        }
    }

    fn imu_record(ts: i64) -> ContainerRecord {
        ContainerRecord::Imu {
            stream_id: 1,
            sample: ImuSample {
                timestamp_us: ts,
                accel: [0.0, 0.0, 1.0],
                gyro: [0.0; 3],
                temperature: 21.0,
            },
        }
    }

    fn frame_record(ts: i64) -> ContainerRecord {
        ContainerRecord::Image {
            stream_id: 2,
            frame: FrameSample {
                timestamp_us: ts,
                width: 8,
                height: 6,
                pixels: vec![1000; 48],
                exposure_us: Some(4_000),
            },
            wall_clock_ms: None,
            arrival_unix_s: 1_700_000_000.0 + ts as f64 / 1e6,
        }
    }

    /// Writer that fails from the n-th write call on
    struct FailingWriter {
        calls: Arc<AtomicUsize>,
        fail_from: usize,
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

    #[test]
    fn test_write_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.dvsrec");
        let mut recorder = Recorder::new("test", RecorderOptions::default());

        recorder.start(&streams(), &path).unwrap();
        assert!(recorder.is_recording());
        recorder.write(&event_record(10)).unwrap();
        recorder.write(&imu_record(11)).unwrap();
        recorder.write(&frame_record(12)).unwrap();
        recorder.flush().unwrap();
        assert_eq!(recorder.stop().unwrap(), path);
        assert!(!recorder.is_recording());

        let reader = ContainerReader::open(&path).unwrap();
        assert_eq!(reader.streams().len(), 3);
        let records: Vec<ContainerRecord> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(records, vec![event_record(10), imu_record(11), frame_record(12)]);
        assert_eq!(recorder.metrics().records_written(), 3);
    }

    #[test]
    fn test_kind_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("imu_only.dvsrec");
        let mut options = RecorderOptions::default();
        options.record_kinds = HashSet::from([PacketKind::Imu]);
        let mut recorder = Recorder::new("test", options);

        recorder.start(&streams(), &path).unwrap();
        recorder.write(&event_record(1)).unwrap();
        recorder.write(&imu_record(2)).unwrap();
        recorder.write(&frame_record(3)).unwrap();
        recorder.stop().unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        assert_eq!(reader.streams().len(), 1);
        let records: Vec<ContainerRecord> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(records, vec![imu_record(2)]);
        assert_eq!(recorder.metrics().filtered_count(), 2);
        assert!(recorder.is_ok());
    }

    #[test]
    fn test_failure_clears_health_and_keeps_trying() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let writer = FailingWriter {
            calls: calls.clone(),
            // header is the first write
            fail_from: 11,
        };
        let mut recorder = Recorder::new("test", RecorderOptions {
            utc_log: false,
            ..Default::default()
        });
        recorder
            .start_with_writer(&streams(), &dir.path().join("x.dvsrec"), Box::new(writer))
            .unwrap();
        let health = recorder.health();

        let results: Vec<bool> = (0..15)
            .map(|i| recorder.write(&imu_record(i)).is_ok())
            .collect();

        assert_eq!(results.iter().filter(|ok| **ok).count(), 9);
        assert!(!results[9]);
        assert!(!health.is_ok());
        assert!(!recorder.is_ok());
        // all 15 writes were attempted
        assert_eq!(calls.load(Ordering::SeqCst), 16);
        assert_eq!(recorder.metrics().failure_count(), 6);

        // a new recording resets the flag
        recorder.stop().unwrap();
        recorder
            .start_with_writer(&streams(), &dir.path().join("y.dvsrec"), Box::new(io::sink()))
            .unwrap();
        assert!(health.is_ok());
    }

    #[test]
    fn test_sidecars_written() {
        let dir = tempdir().unwrap();
        let mut options = RecorderOptions {
            output_dir: dir.path().to_path_buf(),
            event_log: true,
            frame_images: true,
            frame_log: true,
            utc_log: true,
            ..Default::default()
        };
        options.file_name = Some("run.dvsrec".to_string());
        let mut recorder = Recorder::new("test", options);
        let path = recorder.next_path();
        assert_eq!(path, dir.path().join("run.dvsrec"));

        recorder.start(&streams(), &path).unwrap();
        recorder.write(&event_record(5)).unwrap();
        recorder.write(&frame_record(6)).unwrap();
        recorder.write(&frame_record(7)).unwrap();
        recorder.flush().unwrap();
        recorder.stop().unwrap();

        assert_eq!(std::fs::read(dir.path().join("dvs.bin")).unwrap().len(), 4 + 13);
        assert!(dir.path().join("aps_Img").join("00001.png").exists());
        let log = std::fs::read_to_string(dir.path().join("aps_frames.txt")).unwrap();
        assert_eq!(log.lines().count(), 2);

        let utc = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .find(|e| e.file_name().to_string_lossy().starts_with("utc_"))
            .unwrap();
        let content = std::fs::read_to_string(utc.path()).unwrap();
        assert_eq!(content.lines().next(), Some("0.000006 1700000000.000006"));
    }

    #[test]
    fn test_temp_name_and_finalize() {
        let dir = tempdir().unwrap();
        let recorder = Recorder::new("test", RecorderOptions {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let path = recorder.next_path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("temp_dvs_capture_"));
        assert!(name.ends_with(".dvsrec"));
        // temp_dvs_capture_yyyy_MM_dd-hh_mm_ss.dvsrec
        assert_eq!(name.len(), "temp_dvs_capture_".len() + 19 + ".dvsrec".len());

        std::fs::write(&path, b"data").unwrap();
        let dest = dir.path().join("kept").join("final.dvsrec");
        assert_eq!(finalize_to(&path, &dest).unwrap(), dest);
        assert!(!path.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"data");
    }

    #[test]
    fn test_write_without_start() {
        let mut recorder = Recorder::new("test", RecorderOptions::default());
        let err = recorder.write(&imu_record(1)).unwrap_err();
        assert!(matches!(err, ContractError::NotRecording { .. }));
        // not a record failure
        assert!(recorder.is_ok());
        assert!(recorder.stop().is_err());
    }
}
