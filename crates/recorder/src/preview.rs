//! PreviewRenderer - lossy live view
//!
//! Accumulates events into a grey/white/black image between refreshes,
//! keeps the most recent frame and estimates event/frame rates from bounded
//! ring buffers of recent timestamps. Every `refresh` interval the current
//! state is published to a [`PreviewHandle`] readable from other threads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{EventSample, FrameSample, ImuSample, PreviewConfig, PreviewItem, PreviewSink};
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};

/// Event image background
pub const BACKGROUND: u8 = 128;
const POSITIVE: u8 = 255;
const NEGATIVE: u8 = 0;

const RATE_WINDOW: usize = 64;

/// Rate estimate over the last few (timestamp, count) observations
pub struct RateEstimator {
    window: HeapRb<(i64, u64)>,
}

impl RateEstimator {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: HeapRb::new(capacity.max(2)),
        }
    }

    pub fn push(&mut self, timestamp_us: i64, count: u64) {
        if self.window.is_full() {
            let _ = self.window.try_pop();
        }
        let _ = self.window.try_push((timestamp_us, count));
    }

    /// Items per second; 0 until two observations span a positive interval
    pub fn per_second(&self) -> f64 {
        let mut iter = self.window.iter();
        let Some(&(first_ts, _)) = iter.next() else {
            return 0.0;
        };
        let (last_ts, count) = iter.fold((first_ts, 0u64), |(_, n), &(ts, c)| (ts, n + c));
        let span_us = last_ts - first_ts;
        if span_us <= 0 {
            return 0.0;
        }
        count as f64 * 1e6 / span_us as f64
    }
}

/// Published preview state
#[derive(Debug, Clone, Default)]
pub struct PreviewImage {
    pub width: u16,
    pub height: u16,
    /// Row-major event image
    pub events: Vec<u8>,
    pub frame: Option<FrameSample>,
    pub imu: Option<ImuSample>,
    pub events_per_second: f64,
    pub frames_per_second: f64,
    /// Number of publishes so far
    pub sequence: u64,
}

/// Shared read access to the last published preview
#[derive(Debug, Clone, Default)]
pub struct PreviewHandle(Arc<Mutex<Option<PreviewImage>>>);

impl PreviewHandle {
    pub fn latest(&self) -> Option<PreviewImage> {
        self.0.lock().clone()
    }

    pub fn sequence(&self) -> u64 {
        self.0.lock().as_ref().map_or(0, |p| p.sequence)
    }

    fn publish(&self, image: PreviewImage) {
        *self.0.lock() = Some(image);
    }
}

pub struct PreviewRenderer {
    width: u16,
    height: u16,
    refresh: Duration,
    last_publish: Option<Instant>,
    canvas: Vec<u8>,
    frame: Option<FrameSample>,
    imu: Option<ImuSample>,
    event_rate: RateEstimator,
    frame_rate: RateEstimator,
    handle: PreviewHandle,
    updates: u64,
    publishes: u64,
}

impl PreviewRenderer {
    pub fn new(width: u16, height: u16, refresh: Duration) -> Self {
        Self {
            width,
            height,
            refresh,
            last_publish: None,
            canvas: vec![BACKGROUND; usize::from(width) * usize::from(height)],
            frame: None,
            imu: None,
            event_rate: RateEstimator::new(RATE_WINDOW),
            frame_rate: RateEstimator::new(RATE_WINDOW),
            handle: PreviewHandle::default(),
            updates: 0,
            publishes: 0,
        }
    }

    pub fn from_config(width: u16, height: u16, config: &PreviewConfig) -> Self {
        Self::new(width, height, config.refresh_interval())
    }

    pub fn handle(&self) -> PreviewHandle {
        self.handle.clone()
    }

    /// Items passed to `update`
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn publishes(&self) -> u64 {
        self.publishes
    }

    pub fn latest_frame(&self) -> Option<&FrameSample> {
        self.frame.as_ref()
    }

    pub fn latest_imu(&self) -> Option<&ImuSample> {
        self.imu.as_ref()
    }

    pub fn events_per_second(&self) -> f64 {
        self.event_rate.per_second()
    }

    pub fn frames_per_second(&self) -> f64 {
        self.frame_rate.per_second()
    }

    /// Event image accumulated since the last publish
    pub fn event_image(&self) -> &[u8] {
        &self.canvas
    }

    fn paint(&mut self, events: &[EventSample]) {
        let width = usize::from(self.width);
        for event in events {
            if event.x >= self.width || event.y >= self.height {
                continue;
            }
            let index = usize::from(event.y) * width + usize::from(event.x);
            self.canvas[index] = if event.polarity { POSITIVE } else { NEGATIVE };
        }
        if let (Some(first), Some(last)) = (events.first(), events.last()) {
            // first observation only anchors the window
            self.event_rate.push(first.timestamp_us, 0);
            self.event_rate.push(last.timestamp_us, events.len() as u64);
        }
    }

    /// Publish now, regardless of the refresh interval
    pub fn publish(&mut self) {
        self.publishes += 1;
        self.handle.publish(PreviewImage {
            width: self.width,
            height: self.height,
            events: self.canvas.clone(),
            frame: self.frame.clone(),
            imu: self.imu,
            events_per_second: self.event_rate.per_second(),
            frames_per_second: self.frame_rate.per_second(),
            sequence: self.publishes,
        });
        self.canvas.fill(BACKGROUND);
        self.last_publish = Some(Instant::now());
    }

    fn maybe_publish(&mut self) {
        let due = self
            .last_publish
            .map_or(true, |at| at.elapsed() >= self.refresh);
        if due {
            self.publish();
        }
    }
}

impl PreviewSink for PreviewRenderer {
    fn update(&mut self, item: PreviewItem<'_>) {
        self.updates += 1;
        match item {
            PreviewItem::Events(events) => self.paint(events),
            PreviewItem::Imu(imu) => self.imu = Some(*imu),
            PreviewItem::Frame(frame) => {
                self.frame_rate.push(frame.timestamp_us, 1);
                self.frame = Some(frame.clone());
            }
        }
        self.maybe_publish();
    }
}
