//! Container -> sidecar conversion
//!
//! Re-emits the compact event log, frame images/log and an `imu.csv` (SI
//! units) from a finished recording. With a UTC map, the frame log carries
//! wall-clock milliseconds within the day instead of device timestamps.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{ContainerRecord, ImuSample, PacketKind, StreamDescription};
use tracing::{info, instrument, warn};

use crate::container::ContainerReader;
use crate::error::Result;
use crate::sinks::{unix_to_ms_of_day, EventLogWriter, FrameDump, UtcMap};

pub const IMU_CSV_HEADER: &str =
    "timestamp_us,accel_x,accel_y,accel_z,gyro_x,gyro_y,gyro_z,temperature";

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub output_dir: PathBuf,
    /// UTC map written during capture
    pub utc_map: Option<PathBuf>,
    pub frame_images: bool,
}

impl ConvertOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            utc_map: None,
            frame_images: true,
        }
    }

    pub fn with_utc_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.utc_map = Some(path.into());
        self
    }
}

/// Conversion counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertReport {
    pub event_arrays: u64,
    pub events: u64,
    pub imu_samples: u64,
    pub frames: u64,
    /// Frames whose timestamp was not in the UTC map
    pub utc_misses: u64,
}

/// One IMU line in SI units (m/s², rad/s)
pub fn imu_csv_line(sample: &ImuSample) -> String {
    let [ax, ay, az] = sample.accel_si();
    let [gx, gy, gz] = sample.gyro_si();
    format!(
        "{},{ax},{ay},{az},{gx},{gy},{gz},{}",
        sample.timestamp_us, sample.temperature
    )
}

fn stream_name(streams: &[StreamDescription], kind: PacketKind) -> String {
    streams
        .iter()
        .find(|s| s.kind == kind)
        .map_or_else(|| kind.as_str().to_string(), |s| s.name.clone())
}

#[instrument(name = "convert_container", skip(options), fields(output = %options.output_dir.display()))]
pub fn convert_container(input: &Path, options: &ConvertOptions) -> Result<ConvertReport> {
    let mut reader = ContainerReader::open(input)?;
    let streams = reader.streams().to_vec();
    let dir = options.output_dir.as_path();
    fs::create_dir_all(dir)?;

    let utc = options.utc_map.as_deref().map(UtcMap::load).transpose()?;
    if let Some(map) = &utc {
        info!(entries = map.len(), "utc map loaded");
    }

    let mut report = ConvertReport::default();
    let mut event_log: Option<EventLogWriter> = None;
    let mut frames: Option<FrameDump> = None;
    let mut imu_csv: Option<BufWriter<File>> = None;

    while let Some(record) = reader.next_record()? {
        match record {
            ContainerRecord::EventArray { events, .. } => {
                let log = match event_log.take() {
                    Some(log) => log,
                    None => EventLogWriter::create(
                        dir.join(format!("{}.bin", stream_name(&streams, PacketKind::Event))),
                    )?,
                };
                let log = event_log.insert(log);
                log.push(&events);
                log.flush()?;
                report.event_arrays += 1;
                report.events += events.len() as u64;
            }
            ContainerRecord::Imu { sample, .. } => {
                let csv = match imu_csv.take() {
                    Some(csv) => csv,
                    None => {
                        let mut csv = BufWriter::new(File::create(dir.join("imu.csv"))?);
                        writeln!(csv, "{IMU_CSV_HEADER}")?;
                        csv
                    }
                };
                let csv = imu_csv.insert(csv);
                writeln!(csv, "{}", imu_csv_line(&sample))?;
                report.imu_samples += 1;
            }
            ContainerRecord::Image { frame, .. } => {
                let dump = match frames.take() {
                    Some(dump) => dump,
                    None => FrameDump::create(
                        dir,
                        &stream_name(&streams, PacketKind::Frame),
                        options.frame_images,
                        true,
                    )?,
                };
                let dump = frames.insert(dump);
                let log_timestamp = match &utc {
                    Some(map) => match map.lookup(frame.timestamp_us) {
                        Some(unix_s) => i64::from(unix_to_ms_of_day(unix_s)),
                        None => {
                            report.utc_misses += 1;
                            warn!(
                                timestamp_us = frame.timestamp_us,
                                "frame not found in utc map, keeping device timestamp"
                            );
                            frame.timestamp_us
                        }
                    },
                    None => frame.timestamp_us,
                };
                dump.write(&frame, log_timestamp)?;
                report.frames += 1;
            }
        }
    }

    if let Some(dump) = &mut frames {
        dump.flush()?;
    }
    if let Some(csv) = &mut imu_csv {
        csv.flush()?;
    }
    if let Some(map) = &utc {
        if map.len() as u64 != report.frames {
            warn!(
                entries = map.len(),
                frames = report.frames,
                "utc map and container disagree on frame count"
            );
        }
    }
    info!(
        events = report.events,
        imu = report.imu_samples,
        frames = report.frames,
        "container converted"
    );
    Ok(report)
}
