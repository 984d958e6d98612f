//! Container reader

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use contracts::{ContainerRecord, StreamDescription};

use super::codec::{decode_payload, RecordHeader};
use super::{FORMAT_VERSION, MAGIC, RECORD_HEADER_LEN};
use crate::error::{RecorderError, Result};

/// Sequential reader over a capture container
pub struct ContainerReader<R: Read> {
    inner: R,
    version: u16,
    streams: Vec<StreamDescription>,
    offset: u64,
    payload: Vec<u8>,
    finished: bool,
}

impl ContainerReader<BufReader<File>> {
    /// Open a container file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> ContainerReader<R> {
    /// Read and check the header
    pub fn new(mut inner: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        inner.read_exact(&mut magic).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => RecorderError::BadMagic,
            _ => RecorderError::Io(e),
        })?;
        if &magic != MAGIC {
            return Err(RecorderError::BadMagic);
        }

        let mut fixed = [0u8; 6];
        inner.read_exact(&mut fixed)?;
        let version = u16::from_le_bytes([fixed[0], fixed[1]]);
        if version == 0 || version > FORMAT_VERSION {
            return Err(RecorderError::UnsupportedVersion(version));
        }
        let len = u32::from_le_bytes([fixed[2], fixed[3], fixed[4], fixed[5]]) as usize;

        let mut json = vec![0u8; len];
        inner.read_exact(&mut json)?;
        let streams: Vec<StreamDescription> = serde_json::from_slice(&json)?;

        Ok(Self {
            inner,
            version,
            streams,
            offset: (MAGIC.len() + fixed.len() + len) as u64,
            payload: Vec::new(),
            finished: false,
        })
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn streams(&self) -> &[StreamDescription] {
        &self.streams
    }

    /// Byte offset of the next record
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Fill `buf`; `Ok(false)` on a clean end of file before the first byte
    fn fill(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut read = 0;
        while read < buf.len() {
            match self.inner.read(&mut buf[read..]) {
                Ok(0) if read == 0 => return Ok(false),
                Ok(0) => return Err(RecorderError::corrupt(self.offset, "truncated record")),
                Ok(n) => read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    /// Next record, `None` at end of file
    pub fn next_record(&mut self) -> Result<Option<ContainerRecord>> {
        if self.finished {
            return Ok(None);
        }
        let mut raw = [0u8; RECORD_HEADER_LEN];
        if !self.fill(&mut raw)? {
            self.finished = true;
            return Ok(None);
        }
        let header = RecordHeader::decode(&raw, self.offset)?;

        let mut payload = std::mem::take(&mut self.payload);
        payload.resize(header.payload_len as usize, 0);
        let filled = self.fill(&mut payload);
        let result = match filled {
            Ok(true) => decode_payload(&header, &payload, &self.streams, self.offset),
            Ok(false) => Err(RecorderError::corrupt(self.offset, "missing record payload")),
            Err(e) => Err(e),
        };
        self.payload = payload;

        if result.is_err() {
            self.finished = true;
        }
        self.offset += (RECORD_HEADER_LEN + header.payload_len as usize) as u64;
        result.map(Some)
    }
}

impl<R: Read> Iterator for ContainerReader<R> {
    type Item = Result<ContainerRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
