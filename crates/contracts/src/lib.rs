//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Driver packets carry a 32-bit local timestamp plus a per-packet overflow counter
//! - Reconstructed timestamps are 64-bit device-relative microseconds (`Micros`)
//! - Wall-clock alignment is an optional, best-effort offset

mod config;
mod error;
mod packet;
mod sample;
mod sink;
mod source;
mod time;

pub use config::*;
pub use error::*;
pub use packet::*;
pub use sample::*;
pub use sink::*;
pub use source::{PacketHandler, PacketSource};
pub use time::Micros;
