//! Container writer

use std::io::Write;

use bytes::BytesMut;
use contracts::{ContainerRecord, StreamDescription};

use super::codec::{encode_header, encode_record};
use crate::error::Result;

/// Appends encoded records to any `Write`
///
/// Each record is encoded into a reusable scratch buffer and written with a
/// single `write_all`, so a failed write never leaves half a header buffered
/// in this type.
pub struct ContainerWriter<W: Write> {
    inner: W,
    scratch: BytesMut,
    records: u64,
    bytes_written: u64,
}

impl<W: Write> ContainerWriter<W> {
    /// Write the header and return the writer
    pub fn new(mut inner: W, streams: &[StreamDescription]) -> Result<Self> {
        let mut scratch = BytesMut::with_capacity(4096);
        encode_header(streams, &mut scratch)?;
        inner.write_all(&scratch)?;
        let bytes_written = scratch.len() as u64;
        scratch.clear();
        Ok(Self {
            inner,
            scratch,
            records: 0,
            bytes_written,
        })
    }

    /// Append one record, returning its encoded size
    pub fn append(&mut self, record: &ContainerRecord) -> Result<usize> {
        self.scratch.clear();
        encode_record(record, &mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        self.records += 1;
        self.bytes_written += self.scratch.len() as u64;
        Ok(self.scratch.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
