//! Sidecar outputs written next to the container

mod event_log;
mod frame_dump;
mod utc_map;

pub use event_log::{encode_event_block, EventLogWriter};
pub use frame_dump::{frame_log_line, FrameDump};
pub use utc_map::{unix_to_ms_of_day, UtcMap, UtcMapWriter};
