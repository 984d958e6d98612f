//! UTC map (`utc_<datetime>.txt`)
//!
//! One line per recorded frame: `<device seconds> <unix seconds at arrival>`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::warn;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Unix seconds to UTC milliseconds within the day
pub fn unix_to_ms_of_day(unix_s: f64) -> u32 {
    (unix_s * 1000.0).rem_euclid(MS_PER_DAY) as u32
}

fn device_key(device_s: f64) -> i64 {
    (device_s * 1e6).round() as i64
}

pub struct UtcMapWriter {
    path: PathBuf,
    out: BufWriter<File>,
    lines: u64,
}

impl UtcMapWriter {
    /// Create `utc_<yyyy_MM_dd-hh_mm_ss>.txt` in `dir`
    pub fn create(dir: &Path, started: &DateTime<Local>) -> std::io::Result<Self> {
        let path = dir.join(format!("utc_{}.txt", started.format("%Y_%m_%d-%H_%M_%S")));
        let out = BufWriter::new(File::create(&path)?);
        Ok(Self {
            path,
            out,
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, device_us: i64, arrival_unix_s: f64) -> std::io::Result<()> {
        writeln!(self.out, "{:.6} {:.6}", device_us as f64 / 1e6, arrival_unix_s)?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

/// Parsed UTC map keyed by device microseconds
#[derive(Debug, Clone, Default)]
pub struct UtcMap {
    entries: HashMap<i64, f64>,
}

impl UtcMap {
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let mut entries = HashMap::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let parsed = match (fields.next(), fields.next()) {
                (Some(device), Some(unix)) => device.parse::<f64>().ok().zip(unix.parse::<f64>().ok()),
                _ => None,
            };
            match parsed {
                Some((device_s, unix_s)) => {
                    entries.insert(device_key(device_s), unix_s);
                }
                None if line.trim().is_empty() => {}
                None => warn!(line = n + 1, "skipping malformed utc map line"),
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arrival time (unix seconds) of the frame recorded at `device_us`
    pub fn lookup(&self, device_us: i64) -> Option<f64> {
        self.entries.get(&device_us).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_lookup() {
        let dir = tempdir().unwrap();
        let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let mut writer = UtcMapWriter::create(dir.path(), &started).unwrap();
        assert!(writer.path().ends_with("utc_2024_03_09-14_05_07.txt"));

        writer.record(1_000_042, 1_700_000_000.5).unwrap();
        writer.record(2_147_483_700, 1_700_000_001.0).unwrap();
        writer.flush().unwrap();

        let map = UtcMap::load(writer.path()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup(1_000_042), Some(1_700_000_000.5));
        assert_eq!(map.lookup(2_147_483_700), Some(1_700_000_001.0));
        assert_eq!(map.lookup(5), None);
    }

    #[test]
    fn test_ms_of_day() {
        // 2023-11-14T22:13:20.5Z
        assert_eq!(unix_to_ms_of_day(1_700_000_000.5), 80_000_500);
        assert_eq!(unix_to_ms_of_day(86_400.0), 0);
    }
}
