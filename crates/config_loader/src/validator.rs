//! 配置校验模块
//!
//! 校验规则：
//! - start_threshold_us >= 0
//! - tick / idle wait / preview refresh > 0
//! - preview_backlog_threshold > 0
//! - 缓冲容量 (若设置) > 0
//! - 启用标定时 probes >= 2
//! - 设备分辨率与速率合法
//! - 录制启用时 output_dir 非空

use contracts::{CaptureConfig, ContractError};

/// 校验 CaptureConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &CaptureConfig) -> Result<(), ContractError> {
    validate_device(config)?;
    validate_capture(config)?;
    validate_buffers(config)?;
    validate_calibration(config)?;
    validate_recording(config)?;
    validate_preview(config)?;
    Ok(())
}

/// 校验设备参数
fn validate_device(config: &CaptureConfig) -> Result<(), ContractError> {
    let device = &config.device;
    if device.width == 0 || device.height == 0 {
        return Err(ContractError::config_validation(
            "device.width/height",
            format!("resolution must be > 0, got {}x{}", device.width, device.height),
        ));
    }

    for (field, rate) in [
        ("device.event_batch_hz", device.event_batch_hz),
        ("device.imu_rate_hz", device.imu_rate_hz),
        ("device.frame_rate_hz", device.frame_rate_hz),
    ] {
        // 0 表示关闭该流
        if !rate.is_finite() || rate < 0.0 {
            return Err(ContractError::config_validation(
                field,
                format!("rate must be >= 0, got {rate}"),
            ));
        }
    }

    if device.initial_local_ts_us < 0 {
        return Err(ContractError::config_validation(
            "device.initial_local_ts_us",
            "local timestamp must be >= 0",
        ));
    }
    Ok(())
}

/// 校验 DrainLoop 参数
fn validate_capture(config: &CaptureConfig) -> Result<(), ContractError> {
    let capture = &config.capture;
    if capture.start_threshold_us.as_i64() < 0 {
        return Err(ContractError::config_validation(
            "capture.start_threshold_us",
            format!(
                "threshold must be >= 0, got {}",
                capture.start_threshold_us
            ),
        ));
    }
    if capture.tick_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "capture.tick_interval_ms",
            "tick interval must be > 0",
        ));
    }
    if capture.idle_wait_ms == 0 {
        return Err(ContractError::config_validation(
            "capture.idle_wait_ms",
            "idle wait must be > 0",
        ));
    }
    if capture.preview_backlog_threshold == 0 {
        return Err(ContractError::config_validation(
            "capture.preview_backlog_threshold",
            "backlog threshold must be > 0",
        ));
    }
    Ok(())
}

fn validate_buffers(config: &CaptureConfig) -> Result<(), ContractError> {
    if config.buffers.capacity == Some(0) {
        return Err(ContractError::config_validation(
            "buffers.capacity",
            "capacity must be > 0 (omit it for an unbounded buffer)",
        ));
    }
    Ok(())
}

fn validate_calibration(config: &CaptureConfig) -> Result<(), ContractError> {
    let calibration = &config.calibration;
    if calibration.enabled && calibration.probes < 2 {
        return Err(ContractError::config_validation(
            "calibration.probes",
            format!("need at least 2 probes, got {}", calibration.probes),
        ));
    }
    Ok(())
}

fn validate_recording(config: &CaptureConfig) -> Result<(), ContractError> {
    let recording = &config.recording;
    if recording.enabled && recording.output_dir.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "recording.output_dir",
            "output_dir cannot be empty",
        ));
    }
    if let Some(name) = &recording.file_name {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                "recording.file_name",
                "file_name cannot be empty",
            ));
        }
    }
    Ok(())
}

fn validate_preview(config: &CaptureConfig) -> Result<(), ContractError> {
    if config.preview.refresh_ms == 0 {
        return Err(ContractError::config_validation(
            "preview.refresh_ms",
            "refresh interval must be > 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Micros;
    use std::path::PathBuf;

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&CaptureConfig::default()).is_ok());
    }

    #[test]
    fn test_negative_threshold() {
        let mut config = CaptureConfig::default();
        config.capture.start_threshold_us = Micros(-1);
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "capture.start_threshold_us"
        );
    }

    #[test]
    fn test_zero_capacity() {
        let mut config = CaptureConfig::default();
        config.buffers.capacity = Some(0);
        assert_eq!(field_of(validate(&config).unwrap_err()), "buffers.capacity");
    }

    #[test]
    fn test_calibration_probes() {
        let mut config = CaptureConfig::default();
        config.calibration.probes = 1;
        assert!(validate(&config).is_ok());

        config.calibration.enabled = true;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "calibration.probes"
        );
    }

    #[test]
    fn test_empty_output_dir() {
        let mut config = CaptureConfig::default();
        config.recording.output_dir = PathBuf::new();
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "recording.output_dir"
        );

        config.recording.enabled = false;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_rate() {
        let mut config = CaptureConfig::default();
        config.device.frame_rate_hz = f64::NAN;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "device.frame_rate_hz"
        );
    }

    #[test]
    fn test_zero_backlog_threshold() {
        let mut config = CaptureConfig::default();
        config.capture.preview_backlog_threshold = 0;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "capture.preview_backlog_threshold"
        );
    }
}
