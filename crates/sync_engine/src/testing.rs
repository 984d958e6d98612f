//! 测试用的 Recorder / Preview

use std::path::{Path, PathBuf};

use contracts::{
    ContainerRecord, ContractError, HealthFlag, PreviewItem, PreviewSink, RecordSink,
    StreamDescription,
};

/// 内存 Recorder，可在第 N 次写入时开始失败
pub struct MemoryRecorder {
    pub records: Vec<ContainerRecord>,
    pub attempts: usize,
    pub fail_from: Option<usize>,
    recording: bool,
    health: HealthFlag,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            attempts: 0,
            fail_from: None,
            recording: false,
            health: HealthFlag::new(),
        }
    }

    pub fn recording() -> Self {
        let mut recorder = Self::new();
        recorder.recording = true;
        recorder
    }
}

impl RecordSink for MemoryRecorder {
    fn name(&self) -> &str {
        "memory"
    }

    fn start(&mut self, _streams: &[StreamDescription], _path: &Path) -> Result<(), ContractError> {
        self.recording = true;
        self.health.reset();
        Ok(())
    }

    fn write(&mut self, record: &ContainerRecord) -> Result<(), ContractError> {
        self.attempts += 1;
        if self.fail_from.is_some_and(|n| self.attempts >= n) {
            self.health.mark_failed();
            return Err(ContractError::record_write("memory", "disk full"));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<PathBuf, ContractError> {
        self.recording = false;
        Ok(PathBuf::from("memory.dvsrec"))
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn health(&self) -> HealthFlag {
        self.health.clone()
    }
}

#[derive(Default)]
pub struct CountingPreview {
    pub updates: usize,
    pub last_frame_ts: Option<i64>,
}

impl PreviewSink for CountingPreview {
    fn update(&mut self, item: PreviewItem<'_>) {
        self.updates += 1;
        if let PreviewItem::Frame(frame) = item {
            self.last_frame_ts = Some(frame.timestamp_us);
        }
    }
}

