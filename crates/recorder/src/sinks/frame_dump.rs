//! Frame images (`<stream>_Img/%05d.png`) and frame log (`<stream>_frames.txt`)

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::FrameSample;
use image::{ImageBuffer, Luma};

use crate::error::{RecorderError, Result};

/// One frame log line: `<05d index> <timestamp> <exposure_ms|nan>`
pub fn frame_log_line(index: u32, timestamp: i64, frame: &FrameSample) -> String {
    match frame.exposure_ms() {
        Some(ms) => format!("{index:05} {timestamp} {ms}"),
        None => format!("{index:05} {timestamp} nan"),
    }
}

/// Writes numbered frame images and/or the frame log
pub struct FrameDump {
    images_dir: Option<PathBuf>,
    log: Option<BufWriter<File>>,
    next_index: u32,
}

impl FrameDump {
    pub fn create(dir: &Path, stream_name: &str, images: bool, log: bool) -> Result<Self> {
        let images_dir = if images {
            let path = dir.join(format!("{stream_name}_Img"));
            fs::create_dir_all(&path)?;
            Some(path)
        } else {
            None
        };
        let log = if log {
            let file = File::create(dir.join(format!("{stream_name}_frames.txt")))?;
            Some(BufWriter::new(file))
        } else {
            None
        };
        Ok(Self {
            images_dir,
            log,
            next_index: 0,
        })
    }

    pub fn is_active(&self) -> bool {
        self.images_dir.is_some() || self.log.is_some()
    }

    pub fn frames_written(&self) -> u32 {
        self.next_index
    }

    /// Write one frame; `log_timestamp` is the value put in the frame log
    pub fn write(&mut self, frame: &FrameSample, log_timestamp: i64) -> Result<u32> {
        let index = self.next_index;
        if let Some(dir) = &self.images_dir {
            save_gray16(&dir.join(format!("{index:05}.png")), frame)?;
        }
        if let Some(log) = &mut self.log {
            writeln!(log, "{}", frame_log_line(index, log_timestamp, frame))?;
        }
        self.next_index += 1;
        Ok(index)
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(log) = &mut self.log {
            log.flush()?;
        }
        Ok(())
    }
}

fn save_gray16(path: &Path, frame: &FrameSample) -> Result<()> {
    let (width, height) = (frame.width.max(0) as u32, frame.height.max(0) as u32);
    let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(width, height, frame.pixels.clone()).ok_or_else(|| {
            RecorderError::corrupt(
                0,
                format!("frame {width}x{height} has {} pixels", frame.pixels.len()),
            )
        })?;
    buffer.save(path)?;
    Ok(())
}
