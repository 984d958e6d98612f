//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 跨 crate 的采集场景 (时间戳回绕、阈值、积压、录制失败、时钟标定)
//! - Mock 设备驱动的完整会话 (采集 -> 录制 -> 读回 -> 转换)

#[cfg(test)]
mod support;

#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod session_tests;

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_default_config_is_valid() {
        let config = contracts::CaptureConfig::default();
        assert!(config_loader::ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/capture.toml");
        let config = config_loader::ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.device.name, "mock-davis");
        assert!(config.calibration.enabled);
        assert_eq!(config.recording.record_kinds.len(), 3);
    }
}
