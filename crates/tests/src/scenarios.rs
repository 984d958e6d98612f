//! Capture scenarios driven through a real recorder and preview renderer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use contracts::{ContainerRecord, Micros, NoopPreview, PacketKind, RecordSink};
use ingestion::{BatchRef, QueuedBatch};
use recorder::PreviewRenderer;
use sync_engine::{calibrate_wall_clock, ms_of_day, reconstruct, ClockProbe};
use tempfile::tempdir;

use crate::support::{
    container_only, events, frame, imu, read_back, streams, FailingWriter, Harness, SlowRecorder,
    HEIGHT, WIDTH,
};

fn renderer() -> PreviewRenderer {
    PreviewRenderer::new(WIDTH, HEIGHT, Duration::from_millis(40))
}

#[test]
fn test_timestamps_increase_across_wrap() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wrap.dvsrec");
    let mut h = Harness::new(container_only(dir.path()), NoopPreview, Micros::ZERO);
    h.start_recording(&path);

    h.push(events(0, &[i32::MAX - 2_000, i32::MAX - 1_000]));
    h.push(events(0, &[i32::MAX - 10, i32::MAX]));
    h.push(events(1, &[5, 900]));
    h.drain.drain_pass();
    assert_eq!(h.stop_recording(), Some(path.clone()));

    let records = read_back(&path);
    assert_eq!(records.len(), 3);

    let stamps: Vec<i64> = records
        .iter()
        .flat_map(|r| match r {
            ContainerRecord::EventArray { events, .. } => {
                events.iter().map(|e| e.timestamp_us).collect::<Vec<_>>()
            }
            other => panic!("unexpected record {other:?}"),
        })
        .collect();
    assert_eq!(stamps.len(), 6);
    assert!(stamps.windows(2).all(|w| w[0] < w[1]), "{stamps:?}");
    assert_eq!(*stamps.last().unwrap(), reconstruct(900, 1));
    assert_eq!(reconstruct(900, 1), (1_i64 << 31) | 900);
    assert_eq!(h.stats.snapshot().timestamp_regressions, 0);
}

#[test]
fn test_start_threshold_gates_recording() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("threshold.dvsrec");
    let mut h = Harness::new(container_only(dir.path()), NoopPreview, Micros(5_000_000));
    h.start_recording(&path);

    h.push(events(0, &[4_999_999]));
    h.push(events(0, &[5_000_001]));
    h.push(imu(0, &[4_999_999, 5_000_001]));
    h.drain.drain_pass();
    h.stop_recording();

    let records = read_back(&path);
    let stamps: Vec<(PacketKind, i64)> = records
        .iter()
        .map(|r| (r.kind(), r.timestamp_us()))
        .collect();
    assert_eq!(
        stamps,
        vec![(PacketKind::Event, 5_000_001), (PacketKind::Imu, 5_000_001)]
    );
    assert_eq!(h.stats.snapshot().samples_rejected, 2);
}

#[test]
fn test_delayed_tick_records_all_frames_and_previews_latest() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("backlog.dvsrec");
    let mut h = Harness::new(container_only(dir.path()), renderer(), Micros::ZERO);
    h.start_recording(&path);

    for i in 0..1_000 {
        h.push(frame(10_000 + i * 100));
    }
    // consumer stalls while the producer keeps going
    thread::sleep(Duration::from_millis(500));

    let report = h.drain.drain_pass();
    assert_eq!(report.backlog, 1_000);
    assert_eq!(report.records, 1_000);
    assert_eq!(report.preview_skipped, 940);

    let preview = h.drain.preview();
    assert_eq!(preview.updates(), 60);
    assert_eq!(
        preview.latest_frame().map(|f| f.timestamp_us),
        Some(10_000 + 999 * 100)
    );

    h.stop_recording();
    let records = read_back(&path);
    assert_eq!(records.len(), 1_000);
    assert!(records.iter().all(|r| r.kind() == PacketKind::Frame));
    assert!(records
        .windows(2)
        .all(|w| w[0].timestamp_us() < w[1].timestamp_us()));
}

#[test]
fn test_unbounded_buffers_lose_nothing_under_backlog() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mixed.dvsrec");
    let mut h = Harness::new(container_only(dir.path()), renderer(), Micros::ZERO);
    h.start_recording(&path);

    for i in 0..300 {
        let ts = 1_000 + i * 50;
        h.push(events(0, &[ts, ts + 1, ts + 2]));
        h.push(imu(0, &[ts, ts + 25]));
        h.push(frame(ts));
    }
    let report = h.drain.drain_pass();
    assert_eq!(report.backlog, 900);
    assert!(h.buffers.is_empty());
    h.stop_recording();

    let records = read_back(&path);
    let count = |kind| records.iter().filter(|r| r.kind() == kind).count();
    assert_eq!(count(PacketKind::Event), 300);
    assert_eq!(count(PacketKind::Imu), 600);
    assert_eq!(count(PacketKind::Frame), 300);

    for kind in [PacketKind::Event, PacketKind::Imu, PacketKind::Frame] {
        let stamps: Vec<i64> = records
            .iter()
            .filter(|r| r.kind() == kind)
            .map(ContainerRecord::timestamp_us)
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]), "{kind} out of order");
    }
}

#[test]
fn test_recorder_failure_finishes_pass_then_stops_recording() {
    let dir = tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut recorder = container_only(dir.path());
    recorder
        .start_with_writer(
            &streams(),
            &dir.path().join("failing.dvsrec"),
            Box::new(FailingWriter {
                calls: calls.clone(),
                // the header is the first write, so the 10th record fails
                fail_from: 11,
            }),
        )
        .unwrap();
    let health = recorder.health();
    let metrics = recorder.metrics().clone();

    let mut h = Harness::new(recorder, NoopPreview, Micros::ZERO);
    let stamps: Vec<i32> = (1..=15).collect();
    h.push(imu(0, &stamps));
    h.drain.drain_pass();

    assert!(!health.is_ok());
    assert!(!h.drain.recorder().is_ok());
    assert_eq!(metrics.records_written(), 9);
    assert_eq!(metrics.failure_count(), 6);
    assert_eq!(calls.load(Ordering::SeqCst), 16);

    let snapshot = h.stats.snapshot();
    assert_eq!(snapshot.records_submitted, 15);
    assert_eq!(snapshot.record_failures, 6);
    assert_eq!(snapshot.recordings_aborted, 1);

    // the pass that failed closed the recording; later passes only preview
    assert!(!h.drain.recorder().is_recording());
    h.push(imu(0, &[20, 21]));
    h.drain.drain_pass();
    assert_eq!(calls.load(Ordering::SeqCst), 16);
    assert_eq!(metrics.failure_count(), 6);
    assert_eq!(h.stats.snapshot().records_submitted, 15);

    assert_eq!(h.stop_recording(), Some(dir.path().join("failing.dvsrec")));
    assert_eq!(h.stop_recording(), None);
}

#[test]
fn test_calibration_reproduces_wall_clock_of_day() {
    // device clock started 3.2 s before 09:15:00.250 UTC
    let wall_start = Utc
        .with_ymd_and_hms(2024, 5, 17, 9, 15, 0)
        .unwrap()
        + chrono::Duration::milliseconds(250);
    let device_start_us = 3_200_000_i64;

    let probes: Vec<ClockProbe> = (0..10)
        .map(|i| {
            // up to +-4 ms of read jitter
            let jitter_ms = [3, -2, 1, -4, 0, 2, -1, 4, -3, 0][i as usize];
            let wall = wall_start
                + chrono::Duration::milliseconds(i * 100 + jitter_ms);
            ClockProbe::at(device_start_us + i * 100_000, &wall)
        })
        .collect();
    let calibration = calibrate_wall_clock(&probes).unwrap();
    assert_eq!(calibration.probe_count(), 10);
    assert!(calibration.jitter_ms() < 5.0);

    let later_device_us = device_start_us + 42_000_000;
    let expected = ms_of_day(&(wall_start + chrono::Duration::seconds(42)));
    let derived = calibration.to_wall_ms_of_day(later_device_us);
    assert!(
        (derived - expected).abs() <= 50.0,
        "derived {derived} expected {expected}"
    );
}

#[test]
fn test_calibrated_frames_carry_wall_clock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibrated.dvsrec");
    let probes = [
        ClockProbe::new(0, 1_000.0),
        ClockProbe::new(100_000, 1_100.0),
    ];
    let calibration = calibrate_wall_clock(&probes).unwrap();

    let mut h = Harness::new(container_only(dir.path()), NoopPreview, Micros::ZERO);
    h.drain = h.drain.with_calibration(Some(calibration));
    h.start_recording(&path);
    h.push(frame(2_000_000));
    h.drain.drain_pass();
    h.stop_recording();

    match &read_back(&path)[0] {
        ContainerRecord::Image { wall_clock_ms, .. } => {
            assert_eq!(*wall_clock_ms, Some(3_000));
        }
        other => panic!("unexpected record {other:?}"),
    }
}

#[test]
fn test_producers_do_not_wait_for_stalled_consumer() {
    let recorder = SlowRecorder::new(Duration::from_secs(1), 1);
    let in_write = recorder.in_write.clone();
    let writes = recorder.writes.clone();
    let h = Harness::new(recorder, NoopPreview, Micros::ZERO);
    let buffers = h.buffers.clone();
    let signal = buffers.signal().clone();
    let _commands = h.commands;

    h.buffers
        .buffer(PacketKind::Event)
        .push(QueuedBatch::now(BatchRef::Owned(events(0, &[1]))));
    let drain = h.drain;
    let consumer = thread::spawn(move || drain.run());

    let deadline = Instant::now() + Duration::from_secs(5);
    while !in_write.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(in_write.load(Ordering::SeqCst), "drain loop never reached the recorder");

    // the drain loop sits inside a one second write while these run
    let producer_buffers = buffers.clone();
    let producer = thread::spawn(move || {
        let mut slowest = Duration::ZERO;
        let started = Instant::now();
        for i in 0..5_000 {
            let pushed = Instant::now();
            producer_buffers
                .buffer(PacketKind::Event)
                .push(QueuedBatch::now(BatchRef::Owned(events(0, &[10 + i, 11 + i]))));
            slowest = slowest.max(pushed.elapsed());
        }
        (slowest, started.elapsed())
    });
    let (slowest, total) = producer.join().unwrap();

    assert!(in_write.load(Ordering::SeqCst), "write ended before the pushes finished");
    assert!(slowest < Duration::from_millis(100), "slowest push took {slowest:?}");
    assert!(total < Duration::from_millis(500), "pushes took {total:?}");
    assert_eq!(buffers.buffer(PacketKind::Event).len(), 5_000);

    signal.shutdown();
    let outcome = consumer.join().unwrap();
    assert!(outcome.partial.is_none());
    assert_eq!(writes.load(Ordering::SeqCst), 5_001);
}
