//! Compact binary event log (`<stream>.bin`)
//!
//! Every flush appends one block: u32 LE event count, then 13-byte events
//! (i64 LE timestamp, u16 LE x, u16 LE y, u8 polarity).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use contracts::EventSample;
use tracing::{trace, warn};

use crate::container::EVENT_LEN;

/// Encode one block into `out`
pub fn encode_event_block(events: &[EventSample], out: &mut BytesMut) {
    out.reserve(4 + events.len() * EVENT_LEN);
    out.put_u32_le(events.len() as u32);
    for event in events {
        out.put_i64_le(event.timestamp_us);
        out.put_u16_le(event.x);
        out.put_u16_le(event.y);
        out.put_u8(u8::from(event.polarity));
    }
}

/// Buffered writer for the compact event log
pub struct EventLogWriter<W: Write = File> {
    path: PathBuf,
    out: BufWriter<W>,
    pending: Vec<EventSample>,
    scratch: BytesMut,
    events_written: u64,
}

impl EventLogWriter {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self::with_writer(path, file))
    }
}

impl<W: Write> EventLogWriter<W> {
    pub fn with_writer(path: PathBuf, writer: W) -> Self {
        Self {
            path,
            out: BufWriter::new(writer),
            pending: Vec::new(),
            scratch: BytesMut::new(),
            events_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn push(&mut self, events: &[EventSample]) {
        self.pending.extend_from_slice(events);
    }

    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Write pending events as one block; nothing is written when empty
    ///
    /// Pending events are dropped when the block cannot be written, so a
    /// failing disk never re-sends the same block or grows the queue.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.scratch.clear();
            encode_event_block(&self.pending, &mut self.scratch);
            let count = self.pending.len();
            self.pending.clear();
            if let Err(e) = self.out.write_all(&self.scratch) {
                warn!(
                    path = %self.path.display(),
                    dropped = count,
                    error = %e,
                    "event log block not written, events dropped"
                );
                return Err(e);
            }
            self.events_written += count as u64;
            trace!(events = count, "event log block written");
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_block_per_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dvs.bin");
        let mut log = EventLogWriter::create(&path).unwrap();

        let event = EventSample {
            timestamp_us: 0x0102_0304,
            x: 3,
            y: 4,
            polarity: true,
        };
        log.push(&[event, event]);
        log.flush().unwrap();
        log.flush().unwrap();
        log.push(&[event]);
        log.flush().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), (4 + 2 * 13) + (4 + 13));
        assert_eq!(&bytes[..4], &2u32.to_le_bytes());
        assert_eq!(&bytes[4..12], &0x0102_0304i64.to_le_bytes());
        assert_eq!(bytes[16], 1);
        assert_eq!(log.events_written(), 3);
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_flush_drops_pending() {
        let mut log = EventLogWriter::with_writer(PathBuf::from("dvs.bin"), FullDisk);
        let event = EventSample {
            timestamp_us: 1,
            x: 0,
            y: 0,
            polarity: false,
        };

        // larger than the BufWriter capacity so write_all reaches the disk
        let batch = vec![event; 2_000];
        log.push(&batch);
        assert!(log.flush().is_err());
        assert_eq!(log.pending(), 0);
        assert_eq!(log.events_written(), 0);

        log.push(&batch);
        assert!(log.flush().is_err());
        assert_eq!(log.pending(), 0);
    }
}
