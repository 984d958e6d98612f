//! Full sessions against the mock device.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{CaptureConfig, ContainerRecord, PacketKind, PacketSource};
use ingestion::{MockPacketSource, MockSourceConfig};
use recorder::{convert_container, ConvertOptions, PreviewRenderer, Recorder, RecorderOptions};
use sync_engine::{CaptureSession, SessionError};
use tempfile::tempdir;

use crate::support::read_back;

const CONFIG: &str = r#"
[device]
name = "bench-davis"
width = 64
height = 48
event_batch_hz = 200.0
events_per_batch = 32
imu_rate_hz = 500.0
frame_rate_hz = 50.0

[capture]
start_threshold_us = 0
tick_interval_ms = 5
idle_wait_ms = 5

[calibration]
enabled = true
probes = 3
spacing_ms = 5

[recording]
event_log = true
frame_images = false
frame_log = true
utc_log = false
"#;

fn config(output_dir: PathBuf) -> CaptureConfig {
    let mut config = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
    config.recording.output_dir = output_dir;
    config
}

fn source(config: &CaptureConfig) -> Arc<dyn PacketSource> {
    Arc::new(MockPacketSource::from_device_config(&config.device))
}

#[test]
fn test_session_records_all_streams_in_order() {
    let dir = tempdir().unwrap();
    let config = config(dir.path().to_path_buf());
    let recorder = Recorder::from_config(&config.recording);
    let path = dir.path().join("session.dvsrec");
    let preview = PreviewRenderer::from_config(64, 48, &config.preview);
    let handle = preview.handle();

    let mut session = CaptureSession::start(source(&config), &config, recorder, preview).unwrap();
    session.start_recording(&path).unwrap();
    thread::sleep(Duration::from_millis(400));
    let report = session.stop().unwrap();

    assert_eq!(report.output, Some(path.clone()));
    assert!(report.recorder_ok);
    assert_eq!(report.drain.record_failures, 0);
    assert_eq!(report.ingestion.total_dropped(), 0);
    assert!(handle.latest().is_some());

    let records = read_back(&path);
    let mut last: HashMap<PacketKind, i64> = HashMap::new();
    for record in &records {
        let ts = record.timestamp_us();
        if let Some(previous) = last.insert(record.kind(), ts) {
            assert!(ts >= previous, "{} went backwards", record.kind());
        }
    }
    for kind in [PacketKind::Event, PacketKind::Imu, PacketKind::Frame] {
        assert!(last.contains_key(&kind), "no {kind} records");
    }

    // calibration ran, so frames carry a wall-clock stamp
    assert!(records.iter().any(|r| matches!(
        r,
        ContainerRecord::Image {
            wall_clock_ms: Some(_),
            ..
        }
    )));

    assert!(dir.path().join("dvs.bin").exists());
    assert_eq!(report.recorder.metrics().records_written(), records.len() as u64);
}

#[test]
fn test_recorded_session_converts() {
    let dir = tempdir().unwrap();
    let config = config(dir.path().join("raw"));
    let recorder = Recorder::new("container", RecorderOptions {
        event_log: false,
        frame_log: false,
        ..RecorderOptions::from(&config.recording)
    });
    let path = recorder.next_path();

    let mut session = CaptureSession::start(
        source(&config),
        &config,
        recorder,
        contracts::NoopPreview,
    )
    .unwrap();
    session.start_recording(&path).unwrap();
    thread::sleep(Duration::from_millis(300));
    let stopped = session.stop_recording().unwrap();
    assert_eq!(stopped, Some(path.clone()));
    let report = session.stop().unwrap();
    assert!(report.recorder_ok);

    let out = dir.path().join("converted");
    let converted = convert_container(&path, &ConvertOptions {
        output_dir: out.clone(),
        utc_map: None,
        frame_images: false,
    })
    .unwrap();

    let records = read_back(&path);
    let count = |kind| records.iter().filter(|r| r.kind() == kind).count() as u64;
    assert_eq!(converted.event_arrays, count(PacketKind::Event));
    assert_eq!(converted.imu_samples, count(PacketKind::Imu));
    assert_eq!(converted.frames, count(PacketKind::Frame));

    let csv = std::fs::read_to_string(out.join("imu.csv")).unwrap();
    assert_eq!(csv.lines().count() as u64, converted.imu_samples + 1);
}

#[test]
fn test_unavailable_device_records_nothing() {
    let dir = tempdir().unwrap();
    let config = config(dir.path().to_path_buf());
    let source: Arc<dyn PacketSource> = Arc::new(MockPacketSource::new(MockSourceConfig {
        fail_on_start: true,
        ..MockSourceConfig::from(&config.device)
    }));

    let result = CaptureSession::start(
        source,
        &config,
        Recorder::from_config(&config.recording),
        contracts::NoopPreview,
    );
    assert!(matches!(result, Err(SessionError::DeviceUnavailable(_))));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_preview_only_session_writes_no_container() {
    let dir = tempdir().unwrap();
    let config = config(dir.path().to_path_buf());
    let preview = PreviewRenderer::from_config(64, 48, &config.preview);

    let session = CaptureSession::start(
        source(&config),
        &config,
        Recorder::from_config(&config.recording),
        preview,
    )
    .unwrap();
    thread::sleep(Duration::from_millis(200));
    let report = session.stop().unwrap();

    assert_eq!(report.output, None);
    assert_eq!(report.drain.records_submitted, 0);
    assert!(report.preview.updates() > 0);
    assert_eq!(report.recorder.metrics().records_written(), 0);
}
