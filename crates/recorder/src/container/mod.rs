//! Append-only capture container
//!
//! Layout:
//!
//! ```text
//! header:  b"DVSREC01" | u16 version | u32 len | JSON [StreamDescription]
//! record:  u8 kind | u16 stream id | i64 timestamp_us | u32 len | payload
//! ```
//!
//! All integers are little-endian; frame pixels are stored in host byte order.

mod codec;
mod reader;
mod writer;

pub use codec::{decode_payload, encode_header, encode_record, RecordHeader};
pub use reader::ContainerReader;
pub use writer::ContainerWriter;

/// File magic
pub const MAGIC: &[u8; 8] = b"DVSREC01";

/// Current format version
pub const FORMAT_VERSION: u16 = 1;

/// Default container extension
pub const EXTENSION: &str = "dvsrec";

/// Encoded size of one record header
pub const RECORD_HEADER_LEN: usize = 1 + 2 + 8 + 4;

/// Encoded size of one event (i64 ts, u16 x, u16 y, u8 polarity)
pub const EVENT_LEN: usize = 13;
