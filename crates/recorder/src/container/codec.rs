//! Record encoding with `bytes`

use bytes::{Buf, BufMut, BytesMut};
use contracts::{
    ContainerRecord, EventSample, FrameSample, ImuSample, PacketKind, StreamDescription,
};

use super::{EVENT_LEN, FORMAT_VERSION, MAGIC, RECORD_HEADER_LEN};
use crate::error::{RecorderError, Result};

const FLAG_EXPOSURE: u8 = 0b01;
const FLAG_WALL_CLOCK: u8 = 0b10;

/// Fixed part of every record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub kind: PacketKind,
    pub stream_id: u16,
    pub timestamp_us: i64,
    pub payload_len: u32,
}

impl RecordHeader {
    pub fn decode(mut buf: &[u8], offset: u64) -> Result<Self> {
        if buf.len() < RECORD_HEADER_LEN {
            return Err(RecorderError::corrupt(offset, "truncated record header"));
        }
        let tag = buf.get_u8();
        let kind = PacketKind::from_tag(tag)
            .filter(|k| *k != PacketKind::Special)
            .ok_or_else(|| RecorderError::corrupt(offset, format!("unknown record kind {tag}")))?;
        Ok(Self {
            kind,
            stream_id: buf.get_u16_le(),
            timestamp_us: buf.get_i64_le(),
            payload_len: buf.get_u32_le(),
        })
    }
}

/// Encode the file header
pub fn encode_header(streams: &[StreamDescription], out: &mut BytesMut) -> Result<()> {
    let json = serde_json::to_vec(streams)?;
    out.reserve(MAGIC.len() + 2 + 4 + json.len());
    out.put_slice(MAGIC);
    out.put_u16_le(FORMAT_VERSION);
    out.put_u32_le(json.len() as u32);
    out.put_slice(&json);
    Ok(())
}

/// Encode one record (header + payload) into `out`
pub fn encode_record(record: &ContainerRecord, out: &mut BytesMut) {
    let start = out.len();
    out.put_u8(record.kind().tag());
    out.put_u16_le(record.stream_id());
    out.put_i64_le(record.timestamp_us());
    // payload length patched below
    out.put_u32_le(0);
    let payload_start = out.len();

    match record {
        ContainerRecord::EventArray { events, .. } => {
            out.reserve(4 + events.len() * EVENT_LEN);
            out.put_u32_le(events.len() as u32);
            for event in events {
                out.put_i64_le(event.timestamp_us);
                out.put_u16_le(event.x);
                out.put_u16_le(event.y);
                out.put_u8(u8::from(event.polarity));
            }
        }
        ContainerRecord::Imu { sample, .. } => {
            for value in sample.accel.iter().chain(sample.gyro.iter()) {
                out.put_f32_le(*value);
            }
            out.put_f32_le(sample.temperature);
        }
        ContainerRecord::Image {
            frame,
            wall_clock_ms,
            arrival_unix_s,
            ..
        } => {
            let mut flags = 0;
            if frame.exposure_us.is_some() {
                flags |= FLAG_EXPOSURE;
            }
            if wall_clock_ms.is_some() {
                flags |= FLAG_WALL_CLOCK;
            }
            out.put_i32_le(frame.width);
            out.put_i32_le(frame.height);
            out.put_u8(flags);
            if let Some(exposure) = frame.exposure_us {
                out.put_i64_le(exposure);
            }
            if let Some(ms) = wall_clock_ms {
                out.put_u32_le(*ms);
            }
            out.put_f64_le(*arrival_unix_s);
            out.put_slice(bytemuck::cast_slice(frame.pixels.as_slice()));
        }
    }

    let payload_len = (out.len() - payload_start) as u32;
    out[start + RECORD_HEADER_LEN - 4..payload_start].copy_from_slice(&payload_len.to_le_bytes());
}

fn need(buf: &[u8], n: usize, offset: u64, what: &str) -> Result<()> {
    if buf.remaining() < n {
        return Err(RecorderError::corrupt(offset, format!("truncated {what}")));
    }
    Ok(())
}

/// Decode a payload into a record
///
/// Event arrays take their geometry from the stream table.
pub fn decode_payload(
    header: &RecordHeader,
    mut payload: &[u8],
    streams: &[StreamDescription],
    offset: u64,
) -> Result<ContainerRecord> {
    let record = match header.kind {
        PacketKind::Event => {
            need(payload, 4, offset, "event count")?;
            let count = payload.get_u32_le() as usize;
            need(payload, count * EVENT_LEN, offset, "event array")?;
            let events = (0..count)
                .map(|_| EventSample {
                    timestamp_us: payload.get_i64_le(),
                    x: payload.get_u16_le(),
                    y: payload.get_u16_le(),
                    polarity: payload.get_u8() != 0,
                })
                .collect();
            let (width, height) = streams
                .iter()
                .find(|s| s.stream_id == header.stream_id)
                .map_or((0, 0), |s| (s.width, s.height));
            ContainerRecord::EventArray {
                stream_id: header.stream_id,
                timestamp_us: header.timestamp_us,
                width,
                height,
                events,
            }
        }
        PacketKind::Imu => {
            need(payload, 7 * 4, offset, "imu sample")?;
            let mut values = [0f32; 7];
            for v in &mut values {
                *v = payload.get_f32_le();
            }
            ContainerRecord::Imu {
                stream_id: header.stream_id,
                sample: ImuSample {
                    timestamp_us: header.timestamp_us,
                    accel: [values[0], values[1], values[2]],
                    gyro: [values[3], values[4], values[5]],
                    temperature: values[6],
                },
            }
        }
        PacketKind::Frame => {
            need(payload, 9, offset, "image header")?;
            let width = payload.get_i32_le();
            let height = payload.get_i32_le();
            let flags = payload.get_u8();
            let exposure_us = if flags & FLAG_EXPOSURE != 0 {
                need(payload, 8, offset, "exposure")?;
                Some(payload.get_i64_le())
            } else {
                None
            };
            let wall_clock_ms = if flags & FLAG_WALL_CLOCK != 0 {
                need(payload, 4, offset, "wall clock")?;
                Some(payload.get_u32_le())
            } else {
                None
            };
            need(payload, 8, offset, "arrival time")?;
            let arrival_unix_s = payload.get_f64_le();

            let expected = width.max(0) as usize * height.max(0) as usize * 2;
            if payload.remaining() != expected {
                return Err(RecorderError::corrupt(
                    offset,
                    format!("image {width}x{height} has {} pixel bytes", payload.remaining()),
                ));
            }
            ContainerRecord::Image {
                stream_id: header.stream_id,
                frame: FrameSample {
                    timestamp_us: header.timestamp_us,
                    width,
                    height,
                    pixels: bytemuck::pod_collect_to_vec(payload),
                    exposure_us,
                },
                wall_clock_ms,
                arrival_unix_s,
            }
        }
        PacketKind::Special => {
            return Err(RecorderError::corrupt(offset, "special records are not stored"));
        }
    };
    Ok(record)
}
